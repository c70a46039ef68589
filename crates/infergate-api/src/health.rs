// Health route

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    queue_backend: String,
}

/// State for the health endpoint
#[derive(Clone)]
pub struct HealthState {
    pub queue_backend: String,
}

pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        queue_backend: state.queue_backend.clone(),
    })
}
