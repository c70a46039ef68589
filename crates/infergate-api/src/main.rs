// Infergate API server
// Decision: the collector preflights the response queue before the server
// binds - an unreachable queue must fail startup, not hang every caller

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use infergate_api::metrics::{AppMetrics, MetricsState};
use infergate_api::services::DispatchService;
use infergate_api::sinks::{BlobStore, HttpBlobStore, InfluxSink, TimeSeriesSink};
use infergate_api::{health, metrics, predictions, telemetry};
use infergate_core::{CorrelationStore, EngineConfig, QueueClient, ResponseCollector, ResultWaiter};
use infergate_queue::HttpQueueClient;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(predictions::create_prediction, telemetry::write_telemetry),
    components(schemas(telemetry::TelemetryPoint)),
    tags(
        (name = "predictions", description = "Synchronous prediction dispatch"),
        (name = "telemetry", description = "Telemetry write endpoint")
    ),
    info(
        title = "Infergate API",
        version = "0.1.0",
        description = "Synchronous HTTP gateway in front of queued inference workers"
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "infergate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("infergate-api starting...");

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    info!(
        request_queue = %config.request_queue_url,
        response_queue = %config.response_queue_url,
        "queue pair configured"
    );

    let queue: Arc<dyn QueueClient> = Arc::new(HttpQueueClient::new(&config));
    let store = Arc::new(CorrelationStore::new());

    // The collector must be provably alive before traffic is accepted
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = ResponseCollector::new(queue.clone(), store.clone(), config.clone(), shutdown_rx);
    collector
        .preflight()
        .await
        .context("response queue unreachable at startup")?;
    let collector_handle = collector.spawn();

    let blobs: Arc<dyn BlobStore> =
        Arc::new(HttpBlobStore::from_env().context("blob store not configured")?);

    // Telemetry degrades gracefully when the sink is not configured
    let sink: Option<Arc<dyn TimeSeriesSink>> = match InfluxSink::from_env() {
        Ok(sink) => {
            info!("time-series sink configured");
            Some(Arc::new(sink))
        }
        Err(e) => {
            tracing::warn!("time-series sink not configured: {e}. Telemetry writes disabled.");
            None
        }
    };

    let waiter = ResultWaiter::new(store.clone(), queue.clone(), config.waiter_poll_interval);
    let dispatch = Arc::new(DispatchService::new(
        blobs,
        queue,
        waiter,
        config.wait_timeout,
    ));
    let app_metrics = AppMetrics::new().context("failed to build metrics registry")?;

    let app = axum::Router::new()
        .merge(health::routes(health::HealthState {
            queue_backend: "sqs-compatible".to_string(),
        }))
        .merge(predictions::routes(predictions::AppState {
            dispatch,
            metrics: app_metrics.clone(),
        }))
        .merge(telemetry::routes(telemetry::AppState { sink }))
        .merge(metrics::routes(MetricsState {
            metrics: app_metrics,
            store,
        }))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http());

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    // Let the collector finish its current cycle
    let _ = collector_handle.await;
    info!("server exiting");

    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutting down gracefully...");
    let _ = shutdown_tx.send(true);
}
