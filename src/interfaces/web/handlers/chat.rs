use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;

use super::super::AppState;
use crate::core::events::EventSink;
use crate::core::llm::ChatMessage;

/// The one streaming endpoint. Validation failures are plain 400 JSON;
/// everything after validation arrives as SSE frames, one StreamEvent per
/// `data:` line.
pub async fn chat_endpoint(State(state): State<AppState>, Json(payload): Json<Value>) -> Response {
    let Some(messages) = payload.get("messages").and_then(Value::as_array) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Messages array required" })),
        )
            .into_response();
    };
    if messages.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "Messages array required" })),
        )
            .into_response();
    }

    let history: Vec<ChatMessage> = messages
        .iter()
        .map(|m| {
            let content = m
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match m.get("role").and_then(Value::as_str) {
                Some("assistant") => ChatMessage::assistant(content),
                _ => ChatMessage::user(content),
            }
        })
        .collect();

    info!("Chat request with {} history entries", history.len());

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.run(history, EventSink::new(tx)).await;
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|evt| {
        let payload = serde_json::to_string(&evt).unwrap_or_else(|_| {
            r#"{"type":"error","message":"event encoding failed"}"#.to_string()
        });
        Ok::<_, Infallible>(Event::default().data(payload))
    });

    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
