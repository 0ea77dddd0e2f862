/// Chat REST API endpoints
///
/// Exposes the conversation over HTTP: each POST is one chat turn (a text message
/// or a file upload) and answers with the messages that turn produced. The full
/// transcript, including placeholders rewritten in place, can be fetched at any time.

use crate::{api::AppState, bot::OutgoingMessage};
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};

/// Request body for a chat message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

/// Messages produced by a single chat turn, with edits applied
///
/// Only this turn's messages, even when other turns run at the same time.
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub replies: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub messages: Vec<OutgoingMessage>,
}

/// Create chat routes
pub fn create_chat_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat/messages", post(send_message).get(transcript))
        .route("/api/chat/documents/{file_name}", post(upload_document))
}

/// Send a chat message or command
///
/// POST /api/chat/messages
/// Body: { "text": "/activate echo" } or { "text": "hi" }
async fn send_message(
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Json<TurnResponse> {
    let sent = state.bot.handle_text(&payload.text).await;

    Json(TurnResponse {
        replies: state.outbox.messages(&sent).await,
    })
}

/// Upload a workflow file
///
/// POST /api/chat/documents/{file_name}
/// Body: raw file contents
async fn upload_document(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    body: Bytes,
) -> Json<TurnResponse> {
    let sent = state.bot.handle_document(&file_name, body.to_vec()).await;

    Json(TurnResponse {
        replies: state.outbox.messages(&sent).await,
    })
}

/// Full conversation transcript
///
/// GET /api/chat/messages
async fn transcript(State(state): State<AppState>) -> Json<TranscriptResponse> {
    Json(TranscriptResponse {
        messages: state.outbox.transcript().await,
    })
}
