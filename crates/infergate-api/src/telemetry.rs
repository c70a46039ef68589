// Telemetry write route
//
// JSON points forwarded to the time-series sink. String field values that
// parse as floats are coerced, matching what sensor clients actually send.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::sinks::{TelemetryRecord, TimeSeriesSink};

/// One telemetry point as posted by a client
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TelemetryPoint {
    /// Measurement name, e.g. "temperature"
    #[schema(example = "temperature")]
    pub measurement: String,
    /// Point tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Field values; numbers, or strings that parse as numbers
    #[schema(value_type = Object)]
    pub fields: HashMap<String, Value>,
}

/// App state for telemetry routes. `sink` is `None` when the time-series
/// backend is not configured; writes then answer 503.
#[derive(Clone)]
pub struct AppState {
    pub sink: Option<Arc<dyn TimeSeriesSink>>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/telemetry", post(write_telemetry))
        .with_state(state)
}

/// POST /v1/telemetry - Write one telemetry point
#[utoipa::path(
    post,
    path = "/v1/telemetry",
    request_body = TelemetryPoint,
    responses(
        (status = 200, description = "Point written"),
        (status = 400, description = "Field value is not numeric"),
        (status = 503, description = "Time-series sink not configured"),
        (status = 500, description = "Sink write failed")
    ),
    tag = "telemetry"
)]
pub async fn write_telemetry(
    State(state): State<AppState>,
    Json(point): Json<TelemetryPoint>,
) -> Result<String, (StatusCode, String)> {
    let Some(sink) = state.sink else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "time-series sink not configured".to_string(),
        ));
    };

    let fields = coerce_fields(point.fields).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    sink.write_point(TelemetryRecord {
        measurement: point.measurement,
        tags: point.tags,
        fields,
    })
    .await
    .map_err(|e| {
        error!(error = %e, "failed to write telemetry point");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to write telemetry point".to_string(),
        )
    })?;

    Ok("ok".to_string())
}

/// Coerce JSON field values to floats; strings are parsed, everything else
/// numeric passes through
fn coerce_fields(raw: HashMap<String, Value>) -> Result<HashMap<String, f64>, String> {
    let mut fields = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let number = match &value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| format!("field {key:?} is out of range"))?,
            Value::String(s) => s
                .parse::<f64>()
                .map_err(|_| format!("field {key:?} is not numeric: {s:?}"))?,
            other => return Err(format!("field {key:?} has unsupported type: {other}")),
        };
        fields.insert(key, number);
    }
    Ok(fields)
}
