// End-to-end dispatch through the correlation engine with the in-memory
// queue pair and a stand-in worker task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use infergate_api::services::DispatchService;
use infergate_api::sinks::MemoryBlobStore;
use infergate_core::{CorrelationStore, EngineConfig, ResponseCollector, ResultWaiter};
use infergate_queue::InMemoryQueue;

struct Gateway {
    dispatch: Arc<DispatchService>,
    queue: Arc<InMemoryQueue>,
    blobs: Arc<MemoryBlobStore>,
    _shutdown: watch::Sender<bool>,
}

fn gateway(wait_timeout: Duration) -> Gateway {
    let queue = Arc::new(InMemoryQueue::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = Arc::new(CorrelationStore::new());
    let config = EngineConfig::for_queues("req", "resp")
        .with_poll_interval(Duration::from_millis(5))
        .with_waiter_poll_interval(Duration::from_millis(5));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ResponseCollector::new(queue.clone(), store.clone(), config.clone(), shutdown_rx).spawn();

    let waiter = ResultWaiter::new(store, queue.clone(), config.waiter_poll_interval);
    let dispatch = Arc::new(DispatchService::new(
        blobs.clone(),
        queue.clone(),
        waiter,
        wait_timeout,
    ));

    Gateway {
        dispatch,
        queue,
        blobs,
        _shutdown: shutdown_tx,
    }
}

/// Stand-in worker: answers every enqueued job with `echo:<job body>`
fn spawn_echo_worker(queue: Arc<InMemoryQueue>) {
    tokio::spawn(async move {
        loop {
            while let Some((correlation_id, body)) = queue.take_request() {
                queue.push_response(&correlation_id, &format!("echo:{body}"));
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });
}

#[tokio::test]
async fn dispatch_returns_own_result_and_acknowledges_once() {
    let gateway = gateway(Duration::from_secs(5));
    spawn_echo_worker(gateway.queue.clone());

    let prediction = gateway
        .dispatch
        .dispatch("img.jpg", b"pixels".to_vec())
        .await
        .unwrap();

    assert!(prediction.result.starts_with("echo:"));
    assert!(prediction.result.ends_with("/img.jpg"));
    assert!(!prediction.correlation_id.is_empty());

    // payload was persisted for the worker
    let object_key = prediction.result.trim_start_matches("echo:");
    assert_eq!(gateway.blobs.get(object_key).unwrap(), b"pixels");

    // exactly one acknowledgment for exactly one consumed response
    assert_eq!(gateway.queue.deleted().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_concurrent_dispatches_never_cross_results() {
    let gateway = gateway(Duration::from_secs(10));

    // worker that gathers all 50 jobs first, then answers them out of order
    let worker_queue = gateway.queue.clone();
    tokio::spawn(async move {
        let mut jobs = Vec::new();
        while jobs.len() < 50 {
            while let Some(job) = worker_queue.take_request() {
                jobs.push(job);
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        // stride permutation scrambles completion order relative to arrival
        for i in 0..50 {
            let (correlation_id, body) = &jobs[(i * 7) % 50];
            worker_queue.push_response(correlation_id, &format!("echo:{body}"));
        }
    });

    let mut handles = Vec::new();
    for i in 0..50 {
        let dispatch = gateway.dispatch.clone();
        handles.push(tokio::spawn(async move {
            let file_name = format!("file-{i}.bin");
            let prediction = dispatch
                .dispatch(&file_name, file_name.clone().into_bytes())
                .await
                .unwrap();
            (file_name, prediction)
        }));
    }

    for handle in handles {
        let (file_name, prediction) = handle.await.unwrap();
        // every caller gets the result for its own upload, nobody else's
        assert!(
            prediction.result.ends_with(&format!("/{file_name}")),
            "dispatch for {file_name} got {}",
            prediction.result
        );
    }

    assert_eq!(gateway.queue.deleted().len(), 50);
}

#[tokio::test]
async fn deadline_elapses_as_timeout_not_hang() {
    // no worker ever answers
    let gateway = gateway(Duration::from_millis(300));
    let start = Instant::now();

    let err = gateway
        .dispatch
        .dispatch("img.jpg", b"pixels".to_vec())
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300));
    assert!(
        elapsed < Duration::from_millis(1_500),
        "timeout took {elapsed:?}"
    );
}

#[tokio::test]
async fn failed_acknowledgment_still_delivers_the_payload() {
    let gateway = gateway(Duration::from_secs(5));
    gateway.queue.fail_deletes(true);
    spawn_echo_worker(gateway.queue.clone());

    let prediction = gateway
        .dispatch
        .dispatch("img.jpg", b"pixels".to_vec())
        .await
        .unwrap();

    assert!(prediction.result.starts_with("echo:"));
    assert!(gateway.queue.deleted().is_empty());
}

#[tokio::test]
async fn malformed_response_does_not_stall_the_collector() {
    let gateway = gateway(Duration::from_secs(5));
    gateway.queue.push_malformed_response("no correlation attribute");
    spawn_echo_worker(gateway.queue.clone());

    let prediction = gateway
        .dispatch
        .dispatch("img.jpg", b"pixels".to_vec())
        .await
        .unwrap();

    assert!(prediction.result.starts_with("echo:"));
}
