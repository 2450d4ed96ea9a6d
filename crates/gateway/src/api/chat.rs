//! Chat endpoint: accept a user message, immediately open a
//! server-sent-event stream, and resolve the turn in a spawned task
//! that feeds the stream.
//!
//! Protocol per request: exactly one `acknowledgment` event, then
//! exactly one terminal event (`response` or `error`), then the
//! stream closes. Malformed requests are rejected with a plain 400
//! before anything is persisted or called.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::runtime::turn::resolve_turn;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub content: Option<String>,
    /// Continue an existing conversation; omitted means start one.
    #[serde(default, alias = "conversation_id")]
    pub conversation_id: Option<i64>,
}

/// Events pushed over the per-request delivery channel, serialized as
/// the SSE `data` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DeliveryEvent {
    #[serde(rename_all = "camelCase")]
    Acknowledgment {
        status: &'static str,
        message: &'static str,
        conversation_id: i64,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        status: &'static str,
        reply: String,
        conversation_id: i64,
    },
    Error {
        status: &'static str,
        error: String,
    },
}

impl DeliveryEvent {
    pub fn acknowledgment(conversation_id: i64) -> Self {
        Self::Acknowledgment {
            status: "processing",
            message: "Message received, generating reply",
            conversation_id,
        }
    }

    pub fn response(reply: String, conversation_id: i64) -> Self {
        Self::Response { status: "completed", reply, conversation_id }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error { status: "error", error: error.into() }
    }
}

pub async fn chat(State(state): State<AppState>, Json(body): Json<ChatRequest>) -> Response {
    // Validate before any side effect.
    let content = match body.content.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "content must be a non-empty string" })),
            )
                .into_response();
        }
    };

    // The acknowledgment carries the conversation id, so a fresh
    // conversation is allocated before the stream opens.
    let conversation_id = match body.conversation_id {
        Some(id) => id,
        None => match state.store.create_conversation().await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "failed to create conversation");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "failed to create conversation" })),
                )
                    .into_response();
            }
        },
    };

    let (tx, rx) = mpsc::channel::<DeliveryEvent>(8);
    tokio::spawn(run_delivery(state, conversation_id, content, tx));

    Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()).into_response()
}

/// Drive one turn and feed the delivery channel: the acknowledgment
/// goes out before the first completion call, then exactly one
/// terminal event. Dropping the sender afterwards closes the stream.
pub async fn run_delivery(
    state: AppState,
    conversation_id: i64,
    content: String,
    tx: mpsc::Sender<DeliveryEvent>,
) {
    let _ = tx.send(DeliveryEvent::acknowledgment(conversation_id)).await;

    match resolve_turn(&state, conversation_id, &content).await {
        Ok(reply) => {
            let _ = tx.send(DeliveryEvent::response(reply, conversation_id)).await;
        }
        Err(e) => {
            tracing::error!(conversation_id, error = %e, "turn resolution failed");
            let _ = tx.send(DeliveryEvent::error(e.to_string())).await;
        }
    }
}

fn event_stream(
    mut rx: mpsc::Receiver<DeliveryEvent>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(Event::default().data(data));
        }
    }
}
