//! HTTP API surface.

pub mod chat;
pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat::chat))
        .route("/health", get(health::health))
}
