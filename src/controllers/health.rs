use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(|| async { "Seat Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .route("/health/ready", get(ready))
}

// Готовность: база (если есть) должна отвечать
async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match &state.db {
        Some(db) => match db.ping().await {
            Ok(()) => (StatusCode::OK, "READY"),
            Err(e) => {
                tracing::error!("readiness check failed: {:?}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "DATABASE UNAVAILABLE")
            }
        },
        None => (StatusCode::OK, "READY"),
    }
}
