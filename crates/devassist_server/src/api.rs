//! HTTP routes.
//!
//! | Method | Path                       | Handler         |
//! |--------|----------------------------|-----------------|
//! | GET    | `/api/project/:id/chat`    | transcript      |
//! | POST   | `/api/project/:id/chat`    | one chat turn   |
//! | GET    | `/preview/:id`             | 307 to preview  |
//!
//! Chat responses are always a JSON envelope with `ok`. Failures of a turn
//! are reported with HTTP 200 and `ok: false`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use devassist_chat::{ChatError, ChatReply, ChatResult, INVALID_PAYLOAD};
use devassist_sandbox::ProjectId;
use devassist_store::{ChatRole, ChatTurn, MAX_READ_LIMIT};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/project/:id/chat", get(get_chat).post(post_chat))
        .route("/preview/:id", get(get_preview))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ReplyEnvelope<'a> {
    ok: bool,
    #[serde(flatten)]
    reply: &'a ChatReply,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    ok: bool,
    error: String,
}

impl ErrorEnvelope {
    fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TurnView {
    role: ChatRole,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_data_url: Option<String>,
}

impl From<ChatTurn> for TurnView {
    fn from(turn: ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
            image_url: turn.image_url,
            image_data_url: turn.image_data_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct TranscriptEnvelope {
    ok: bool,
    turns: Vec<TurnView>,
}

/// JSON envelope for the outcome of a chat turn.
pub fn reply_envelope(result: &ChatResult<ChatReply>) -> Value {
    let value = match result {
        Ok(reply) => serde_json::to_value(ReplyEnvelope { ok: true, reply }),
        Err(e) => serde_json::to_value(ErrorEnvelope::new(e.to_string())),
    };
    value.unwrap_or_else(|e| serde_json::json!({ "ok": false, "error": e.to_string() }))
}

/// Pull the message out of `{message: string}` or `{message: {text: string}}`.
pub fn extract_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let message = value.get("message")?;
    message
        .as_str()
        .or_else(|| message.get("text").and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn parse_project(raw: &str) -> Result<ProjectId, Response> {
    ProjectId::new(raw).map_err(|e| {
        warn!(project_id = raw, error = %e, "Rejected project id");
        (StatusCode::BAD_REQUEST, Json(ErrorEnvelope::new(e.to_string()))).into_response()
    })
}

async fn post_chat(State(state): State<AppState>, Path(raw_id): Path<String>, body: Bytes) -> Response {
    let id = match parse_project(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let Some(message) = extract_message(&body) else {
        return Json(ErrorEnvelope::new(INVALID_PAYLOAD)).into_response();
    };

    let result = state.dispatcher.handle(&id, &message).await;
    match &result {
        Err(e) if e.is_fatal() => error!(project_id = %id, error = %e, "Chat turn aborted"),
        Err(ChatError::InvalidPayload(_)) => {}
        Err(e) => warn!(project_id = %id, error = %e, "Chat turn degraded"),
        Ok(_) => {}
    }
    Json(reply_envelope(&result)).into_response()
}

async fn get_chat(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let id = match parse_project(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.dispatcher.chat().read(&id, MAX_READ_LIMIT) {
        Ok(turns) => Json(TranscriptEnvelope {
            ok: true,
            turns: turns.into_iter().map(TurnView::from).collect(),
        })
        .into_response(),
        Err(e) => {
            error!(project_id = %id, error = %e, "Failed to load chat");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorEnvelope::new(e.to_string()))).into_response()
        }
    }
}

async fn get_preview(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    let id = match parse_project(&raw_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.previews.acquire(&id).await {
        Ok(redirect) => (
            [(header::SET_COOKIE, redirect.cookie.header_value())],
            Redirect::temporary(&redirect.location),
        )
            .into_response(),
        Err(e) => {
            error!(project_id = %id, error = %e, "Preview failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorEnvelope::new(e.to_string()))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_message() {
        assert_eq!(extract_message(br#"{"message": "hi"}"#).as_deref(), Some("hi"));
        assert_eq!(extract_message(br#"{"message": {"text": "hi"}}"#).as_deref(), Some("hi"));
        assert_eq!(extract_message(br#"{"message": 5}"#), None);
        assert_eq!(extract_message(br#"{"message": ""}"#), None);
        assert_eq!(extract_message(br#"{}"#), None);
        assert_eq!(extract_message(b"not json"), None);
    }

    #[test]
    fn test_reply_envelope() {
        let ok: ChatResult<ChatReply> = Ok(ChatReply::Text { reply: "hello".into() });
        assert_eq!(
            reply_envelope(&ok),
            serde_json::json!({ "ok": true, "type": "text", "reply": "hello" })
        );

        let err: ChatResult<ChatReply> = Err(ChatError::GenerationFailed("Build failed".into()));
        assert_eq!(
            reply_envelope(&err),
            serde_json::json!({ "ok": false, "error": "Build failed" })
        );
    }
}
