// Result waiter
//
// Bridges the asynchronously populated store to a blocking per-request call.
// Each in-flight request owns one wait; the engine assumes exactly one waiter
// per correlation id.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::queue::QueueClient;
use crate::store::CorrelationStore;

/// Per-request poll of the correlation store with a hard deadline
#[derive(Clone)]
pub struct ResultWaiter {
    store: Arc<CorrelationStore>,
    queue: Arc<dyn QueueClient>,
    poll_interval: Duration,
}

impl ResultWaiter {
    pub fn new(
        store: Arc<CorrelationStore>,
        queue: Arc<dyn QueueClient>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            poll_interval,
        }
    }

    /// Block until the result for `correlation_id` is staged, then claim it,
    /// acknowledge the underlying queue message and return the payload.
    ///
    /// The deadline is hard: on expiry the wait ends with
    /// [`EngineError::WaitTimeout`]. The acknowledgment happens only after
    /// the payload is in hand, so a crash between match and delete costs a
    /// redelivery, never a lost result. A failed delete is logged and the
    /// payload is still returned.
    ///
    /// Dropping the returned future (caller disconnect) cancels the wait at
    /// the next poll or sleep.
    pub async fn wait(&self, correlation_id: &str, timeout: Duration) -> Result<String> {
        let start = Instant::now();
        let deadline = start + timeout;

        loop {
            if let Some(result) = self.store.try_take(correlation_id) {
                debug!(
                    correlation_id = %correlation_id,
                    waited_ms = start.elapsed().as_millis() as u64,
                    "matched response"
                );
                if let Err(e) = self.queue.delete(&result.ack_token).await {
                    // Tolerable: the message may be redelivered, the next
                    // collector pass restages it and it expires unclaimed.
                    warn!(
                        correlation_id = %correlation_id,
                        error = %e,
                        "failed to acknowledge consumed response message"
                    );
                }
                return Ok(result.payload);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::WaitTimeout {
                    correlation_id: correlation_id.to_string(),
                    waited: start.elapsed(),
                });
            }

            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::queue::{CorrelationId, QueueMessage};
    use crate::store::PendingResult;

    /// Queue fake that records deletes and can be made to fail them
    #[derive(Default)]
    struct AckRecordingQueue {
        deleted: Mutex<Vec<String>>,
        delete_attempts: AtomicUsize,
        fail_deletes: bool,
    }

    impl AckRecordingQueue {
        fn failing() -> Self {
            Self {
                fail_deletes: true,
                ..Default::default()
            }
        }

        fn deleted(&self) -> Vec<String> {
            self.deleted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueueClient for AckRecordingQueue {
        async fn send(&self, _body: &str) -> Result<CorrelationId> {
            unimplemented!("waiter never sends")
        }

        async fn receive(&self, _max: usize, _wait: Duration) -> Result<Vec<QueueMessage>> {
            Ok(Vec::new())
        }

        async fn delete(&self, ack_token: &str) -> Result<()> {
            self.delete_attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_deletes {
                return Err(EngineError::queue("receipt handle expired"));
            }
            self.deleted.lock().unwrap().push(ack_token.to_string());
            Ok(())
        }
    }

    fn pending(payload: &str, ack_token: &str) -> PendingResult {
        PendingResult {
            payload: payload.to_string(),
            ack_token: ack_token.to_string(),
        }
    }

    fn waiter(store: Arc<CorrelationStore>, queue: Arc<AckRecordingQueue>) -> ResultWaiter {
        ResultWaiter::new(store, queue, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn returns_staged_payload_and_deletes_once() {
        let store = Arc::new(CorrelationStore::new());
        let queue = Arc::new(AckRecordingQueue::default());
        store.insert("abc".to_string(), pending("result-1", "tok-1"));

        let payload = waiter(store.clone(), queue.clone())
            .wait("abc", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(payload, "result-1");
        assert_eq!(queue.deleted(), vec!["tok-1".to_string()]);
        assert_eq!(queue.delete_attempts.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn picks_up_result_staged_mid_wait() {
        let store = Arc::new(CorrelationStore::new());
        let queue = Arc::new(AckRecordingQueue::default());

        let staging_store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            staging_store.insert("abc".to_string(), pending("late", "tok-1"));
        });

        let payload = waiter(store, queue)
            .wait("abc", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(payload, "late");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_bounded_margin_of_deadline() {
        let store = Arc::new(CorrelationStore::new());
        let queue = Arc::new(AckRecordingQueue::default());
        let start = Instant::now();

        let err = waiter(store, queue)
            .wait("never", Duration::from_secs(2))
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(err.is_timeout());
        assert!(elapsed >= Duration::from_secs(2));
        // the final sleep is clamped to the remaining time, so expiry lands
        // on the deadline rather than one poll interval past it
        assert!(elapsed < Duration::from_millis(2_200));

        match err {
            EngineError::WaitTimeout { correlation_id, .. } => {
                assert_eq!(correlation_id, "never");
            }
            other => panic!("expected WaitTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_delete_still_returns_payload() {
        let store = Arc::new(CorrelationStore::new());
        let queue = Arc::new(AckRecordingQueue::failing());
        store.insert("abc".to_string(), pending("result-1", "tok-1"));

        let payload = waiter(store, queue.clone())
            .wait("abc", Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(payload, "result-1");
        // the delete was attempted and its failure did not surface
        assert_eq!(queue.delete_attempts.load(Ordering::SeqCst), 1);
        assert!(queue.deleted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn never_observes_another_ids_payload() {
        let store = Arc::new(CorrelationStore::new());
        let queue = Arc::new(AckRecordingQueue::default());
        store.insert("k2".to_string(), pending("payload-2", "tok-2"));

        let err = waiter(store.clone(), queue)
            .wait("k1", Duration::from_millis(500))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        // k2's entry is untouched by k1's waiter
        assert_eq!(store.try_take("k2").unwrap().payload, "payload-2");
    }
}
