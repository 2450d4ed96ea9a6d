use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "provider": state.provider.provider_id(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
