/// Outgoing side of the chat
///
/// Handlers talk to the user through [`ChatTransport`]: they send messages and can
/// later rewrite a message they sent (used for "processing..." placeholders).
/// [`ChatOutbox`] is the in-memory transport behind the HTTP API, and [`TurnRecorder`]
/// wraps any transport for the length of one chat turn.

use crate::config::DEFAULT_TRANSCRIPT_LIMIT;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Identifier of a message sent through a transport
pub type MessageId = Uuid;

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Deliver a new message to the user
    async fn send(&self, text: String) -> Result<MessageId>;

    /// Replace the text of a previously sent message
    async fn edit(&self, id: MessageId, text: String) -> Result<()>;
}

/// A message as delivered to the user, with edits applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub id: MessageId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
    pub edited: bool,
}

/// In-memory transcript of what was sent to the user
///
/// Keeps the most recent `limit` messages. Once a message has been dropped it
/// can no longer be edited.
#[derive(Debug)]
pub struct ChatOutbox {
    messages: Mutex<VecDeque<OutgoingMessage>>,
    limit: usize,
}

impl Default for ChatOutbox {
    fn default() -> Self {
        Self::with_limit(DEFAULT_TRANSCRIPT_LIMIT)
    }
}

impl ChatOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outbox keeping at most `limit` messages (at least one)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    /// Every retained message, oldest first
    pub async fn transcript(&self) -> Vec<OutgoingMessage> {
        self.messages.lock().await.iter().cloned().collect()
    }

    /// Number of retained messages
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }

    /// The retained messages among `ids`, in the order they were sent
    pub async fn messages(&self, ids: &[MessageId]) -> Vec<OutgoingMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| ids.contains(&m.id))
            .cloned()
            .collect()
    }

    /// Text of the most recent message, if any
    pub async fn last_text(&self) -> Option<String> {
        self.messages.lock().await.back().map(|m| m.text.clone())
    }
}

#[async_trait]
impl ChatTransport for ChatOutbox {
    async fn send(&self, text: String) -> Result<MessageId> {
        let message = OutgoingMessage {
            id: Uuid::new_v4(),
            text,
            sent_at: Utc::now(),
            edited: false,
        };
        let id = message.id;

        let mut messages = self.messages.lock().await;
        messages.push_back(message);
        while messages.len() > self.limit {
            messages.pop_front();
        }
        Ok(id)
    }

    async fn edit(&self, id: MessageId, text: String) -> Result<()> {
        let mut messages = self.messages.lock().await;
        let message = messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow!("Message not found: {}", id))?;

        message.text = text;
        message.edited = true;
        Ok(())
    }
}

/// Transport for a single chat turn
///
/// Forwards everything to the shared transport and remembers the ids of the
/// messages it sent, so overlapping turns each report only their own replies.
pub struct TurnRecorder {
    inner: Arc<dyn ChatTransport>,
    sent: Mutex<Vec<MessageId>>,
}

impl TurnRecorder {
    pub fn new(inner: Arc<dyn ChatTransport>) -> Self {
        Self {
            inner,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Ids of the messages sent during this turn, in send order
    pub fn into_sent(self) -> Vec<MessageId> {
        self.sent.into_inner()
    }
}

#[async_trait]
impl ChatTransport for TurnRecorder {
    async fn send(&self, text: String) -> Result<MessageId> {
        let id = self.inner.send(text).await?;
        self.sent.lock().await.push(id);
        Ok(id)
    }

    async fn edit(&self, id: MessageId, text: String) -> Result<()> {
        self.inner.edit(id, text).await
    }
}
