//! services/api/src/web/chat.rs
//!
//! The AI therapy chat endpoints. The assistant reply is a best-effort
//! side channel: if the model call fails the client still gets a canned
//! reply and the session keeps moving.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::ai_chat::FALLBACK_REPLY;
use crate::web::state::AppState;
use crate::web::{fail, port_failure, HandlerError};
use therapy_core::domain::{
    AuthUser, ChatMessage, ChatSender, SessionKind, SessionStatus,
};

#[derive(Deserialize, ToSchema)]
pub struct PostMessageRequest {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ChatMessageView {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub sender: ChatSender,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for ChatMessageView {
    fn from(m: ChatMessage) -> Self {
        Self {
            id: m.id,
            sender: m.sender,
            body: m.body,
            created_at: m.created_at,
        }
    }
}

/// Send a message to the AI therapist and get its reply.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = PostMessageRequest,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatMessageView),
        (status = 400, description = "Not an AI session or empty message"),
        (status = 403, description = "Not the session's client"),
        (status = 409, description = "Session is not in progress")
    ),
    security(("bearer_token" = []))
)]
pub async fn post_chat_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(fail(StatusCode::BAD_REQUEST, "Message cannot be empty"));
    }

    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;
    if session.client_id != user.user_id {
        return Err(fail(
            StatusCode::FORBIDDEN,
            "Only the session's client can chat here",
        ));
    }
    if session.kind != SessionKind::Ai {
        return Err(fail(
            StatusCode::BAD_REQUEST,
            "Only AI sessions support chat messages",
        ));
    }
    if session.status != SessionStatus::InProgress {
        return Err(fail(
            StatusCode::CONFLICT,
            "Start the session before chatting",
        ));
    }

    // Snapshot the conversation before appending the new turn.
    let history = state
        .db
        .get_chat_messages(session_id)
        .await
        .map_err(port_failure)?;

    state
        .db
        .save_chat_message(ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            sender: ChatSender::Client,
            body: message.clone(),
            created_at: Utc::now(),
        })
        .await
        .map_err(port_failure)?;

    // One attempt, no retry. The canned reply stands in when the model
    // call fails; the failure is only logged.
    let reply_body = match state
        .chat
        .reply(session.topic.as_deref(), &history, &message)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!("AI reply failed for session {}: {}", session_id, e);
            FALLBACK_REPLY.to_string()
        }
    };

    let reply = ChatMessage {
        id: Uuid::new_v4(),
        session_id,
        sender: ChatSender::Assistant,
        body: reply_body,
        created_at: Utc::now(),
    };
    state
        .db
        .save_chat_message(reply.clone())
        .await
        .map_err(port_failure)?;

    Ok(Json(ChatMessageView::from(reply)))
}

/// List the conversation inside a session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The conversation so far", body = [ChatMessageView]),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "No such session")
    ),
    security(("bearer_token" = []))
)]
pub async fn list_chat_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(port_failure)?;
    if !session.has_participant(user.user_id) {
        return Err(fail(
            StatusCode::FORBIDDEN,
            "You are not part of this session",
        ));
    }

    let messages = state
        .db
        .get_chat_messages(session_id)
        .await
        .map_err(port_failure)?;
    let views: Vec<ChatMessageView> = messages.into_iter().map(Into::into).collect();
    Ok(Json(views))
}
