// Prediction upload route
//
// Accepts a multipart payload, dispatches it through the worker fleet and
// answers with "<correlation_id>:<result>" as plain text once the result
// arrives.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tracing::error;

use infergate_core::EngineError;

use crate::metrics::AppMetrics;
use crate::services::DispatchService;

/// App state for prediction routes
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<DispatchService>,
    pub metrics: AppMetrics,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/predictions", post(create_prediction))
        .with_state(state)
}

/// POST /v1/predictions - Upload a payload and wait for the worker's result
#[utoipa::path(
    post,
    path = "/v1/predictions",
    request_body(content = String, content_type = "multipart/form-data", description = "Payload in the `file` field"),
    responses(
        (status = 200, description = "Worker result as `<correlation_id>:<result>`", body = String, content_type = "text/plain"),
        (status = 400, description = "Missing or invalid multipart payload"),
        (status = 502, description = "Queue service failure"),
        (status = 504, description = "No worker response within the wait deadline"),
        (status = 500, description = "Internal server error")
    ),
    tag = "predictions"
)]
pub async fn create_prediction(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<String, (StatusCode, String)> {
    let (file_name, bytes) = read_payload(multipart).await?;

    state.metrics.predictions_total.inc();
    state.metrics.predictions_in_flight.inc();
    let timer = state.metrics.wait_seconds.start_timer();

    let outcome = state.dispatch.dispatch(&file_name, bytes).await;

    timer.observe_duration();
    state.metrics.predictions_in_flight.dec();

    match outcome {
        Ok(prediction) => Ok(format!("{}:{}", prediction.correlation_id, prediction.result)),
        Err(e) if e.is_timeout() => {
            state.metrics.prediction_timeouts_total.inc();
            Err((StatusCode::GATEWAY_TIMEOUT, e.to_string()))
        }
        Err(EngineError::Queue(msg)) => {
            error!(error = %msg, "queue service failure during dispatch");
            Err((StatusCode::BAD_GATEWAY, format!("queue error: {msg}")))
        }
        Err(e) => {
            error!(error = %e, "failed to dispatch prediction");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ))
        }
    }
}

/// Pull the `file` field out of the multipart body
async fn read_payload(mut multipart: Multipart) -> Result<(String, Vec<u8>), (StatusCode, String)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("unable to read multipart body: {e}"),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("payload").to_string();
        let bytes = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("unable to read file field: {e}"),
            )
        })?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err((
        StatusCode::BAD_REQUEST,
        "multipart field `file` is required".to_string(),
    ))
}
