// Prometheus metrics
//
// Counters and gauges for the gateway, served in text exposition format.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use tracing::error;

use infergate_core::CorrelationStore;

/// Prometheus content type for the text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gateway metrics
#[derive(Clone)]
pub struct AppMetrics {
    registry: Arc<Registry>,
    /// Total prediction requests accepted
    pub predictions_total: IntCounter,
    /// Prediction requests that timed out waiting for a response
    pub prediction_timeouts_total: IntCounter,
    /// Prediction requests currently blocked on a result
    pub predictions_in_flight: IntGauge,
    /// Results staged in the correlation store, sampled at scrape time
    pub staged_results: IntGauge,
    /// Seconds spent waiting for a matching response
    pub wait_seconds: Histogram,
}

impl AppMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let predictions_total = IntCounter::new(
            "infergate_predictions_total",
            "Total prediction requests accepted",
        )?;
        let prediction_timeouts_total = IntCounter::new(
            "infergate_prediction_timeouts_total",
            "Prediction requests that timed out waiting for a worker response",
        )?;
        let predictions_in_flight = IntGauge::new(
            "infergate_predictions_in_flight",
            "Prediction requests currently waiting for a worker response",
        )?;
        let staged_results = IntGauge::new(
            "infergate_staged_results",
            "Responses staged in the correlation store awaiting pickup",
        )?;
        let wait_seconds = Histogram::with_opts(HistogramOpts::new(
            "infergate_wait_seconds",
            "Time spent waiting for a matching worker response",
        ))?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_timeouts_total.clone()))?;
        registry.register(Box::new(predictions_in_flight.clone()))?;
        registry.register(Box::new(staged_results.clone()))?;
        registry.register(Box::new(wait_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_timeouts_total,
            predictions_in_flight,
            staged_results,
            wait_seconds,
        })
    }

    /// Render the registry in text exposition format
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// State for the metrics route
#[derive(Clone)]
pub struct MetricsState {
    pub metrics: AppMetrics,
    pub store: Arc<CorrelationStore>,
}

pub fn routes(state: MetricsState) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .with_state(state)
}

/// GET /metrics - Prometheus text exposition format
async fn serve_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    state.metrics.staged_results.set(state.store.len() as i64);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.encode(),
    )
}
