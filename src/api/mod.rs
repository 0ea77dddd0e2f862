/// HTTP API Layer
///
/// This module provides the HTTP front end:
/// - Chat endpoints that drive the conversation handlers (/api/chat/*)
/// - Workflow management endpoints over the registry (/api/workflows/*)

use crate::{
    bot::{BotHandlers, ChatOutbox},
    workflow::WorkflowManager,
};
use std::sync::Arc;

// Chat turns and transcript
pub mod chat;

// Workflow registry CRUD and activation
pub mod workflows;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Workflow lifecycle manager
    pub manager: Arc<WorkflowManager>,
    /// Conversation handlers for the single chat user
    pub bot: Arc<BotHandlers>,
    /// Transcript of everything the bot has said
    pub outbox: Arc<ChatOutbox>,
}
