// In-memory queue pair
//
// Stand-in for the managed queue service in tests and local development.
// Received messages are removed immediately; redelivery after a visibility
// timeout is not simulated.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use infergate_core::{CorrelationId, EngineError, QueueClient, QueueMessage, Result};

/// In-memory request/response queue pair
#[derive(Default)]
pub struct InMemoryQueue {
    requests: Mutex<VecDeque<(CorrelationId, String)>>,
    responses: Mutex<VecDeque<QueueMessage>>,
    deleted: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Worker side: claim the oldest enqueued request, if any
    pub fn take_request(&self) -> Option<(CorrelationId, String)> {
        self.requests.lock().unwrap().pop_front()
    }

    /// Worker side: publish a result for the given correlation id
    pub fn push_response(&self, correlation_id: &str, body: &str) -> String {
        let ack_token = format!("rh-{}", Uuid::now_v7());
        self.responses.lock().unwrap().push_back(QueueMessage {
            body: body.to_string(),
            ack_token: ack_token.clone(),
            correlation_id: Some(correlation_id.to_string()),
        });
        ack_token
    }

    /// Publish a response without the correlation attribute (contract violation)
    pub fn push_malformed_response(&self, body: &str) -> String {
        let ack_token = format!("rh-{}", Uuid::now_v7());
        self.responses.lock().unwrap().push_back(QueueMessage {
            body: body.to_string(),
            ack_token: ack_token.clone(),
            correlation_id: None,
        });
        ack_token
    }

    /// Ack tokens seen by delete(), in order
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Make every subsequent delete() fail (acknowledgment-failure scenarios)
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn send(&self, body: &str) -> Result<CorrelationId> {
        let correlation_id = Uuid::now_v7().to_string();
        self.requests
            .lock()
            .unwrap()
            .push_back((correlation_id.clone(), body.to_string()));
        Ok(correlation_id)
    }

    async fn receive(&self, max_messages: usize, _wait: Duration) -> Result<Vec<QueueMessage>> {
        let mut responses = self.responses.lock().unwrap();
        let count = max_messages.min(responses.len());
        Ok(responses.drain(..count).collect())
    }

    async fn delete(&self, ack_token: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(EngineError::queue("simulated delete failure"));
        }
        self.deleted.lock().unwrap().push(ack_token.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_assigns_unique_correlation_ids() {
        let queue = InMemoryQueue::new();
        let a = queue.send("job-a").await.unwrap();
        let b = queue.send("job-b").await.unwrap();
        assert_ne!(a, b);

        let (id, body) = queue.take_request().unwrap();
        assert_eq!(id, a);
        assert_eq!(body, "job-a");
        assert_eq!(queue.pending_requests(), 1);
    }

    #[tokio::test]
    async fn receive_respects_batch_limit() {
        let queue = InMemoryQueue::new();
        for i in 0..5 {
            queue.push_response(&format!("id-{i}"), &format!("result-{i}"));
        }

        let first = queue.receive(3, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 3);
        let rest = queue.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert!(queue.receive(10, Duration::ZERO).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_records_tokens_and_can_fail() {
        let queue = InMemoryQueue::new();
        queue.delete("tok-1").await.unwrap();
        assert_eq!(queue.deleted(), vec!["tok-1".to_string()]);

        queue.fail_deletes(true);
        assert!(queue.delete("tok-2").await.is_err());
        assert_eq!(queue.deleted(), vec!["tok-1".to_string()]);
    }

    #[tokio::test]
    async fn malformed_response_has_no_correlation_id() {
        let queue = InMemoryQueue::new();
        queue.push_malformed_response("orphan");
        let messages = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(messages[0].correlation_id, None);
    }
}
