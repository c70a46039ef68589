// Per-request dispatch
//
// One dispatch handles one caller: persist the payload for the worker,
// enqueue the job, then block on the correlation engine until the worker's
// result comes back. Dispatches are fully independent of each other and of
// the collector.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use infergate_core::{QueueClient, Result, ResultWaiter};

use crate::sinks::BlobStore;

/// A completed round trip through the worker fleet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    /// Queue-assigned id correlating request and response
    pub correlation_id: String,
    /// Raw worker result
    pub result: String,
}

/// Orchestrates one caller's request end to end
pub struct DispatchService {
    blobs: Arc<dyn BlobStore>,
    queue: Arc<dyn QueueClient>,
    waiter: ResultWaiter,
    wait_timeout: Duration,
}

impl DispatchService {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        queue: Arc<dyn QueueClient>,
        waiter: ResultWaiter,
        wait_timeout: Duration,
    ) -> Self {
        Self {
            blobs,
            queue,
            waiter,
            wait_timeout,
        }
    }

    /// Store the payload, enqueue the job and wait for its result
    pub async fn dispatch(&self, file_name: &str, bytes: Vec<u8>) -> Result<Prediction> {
        // Unique object key so concurrent uploads of the same file name
        // cannot clobber each other
        let object_key = format!("{}/{}", Uuid::now_v7(), file_name);
        let object_key = self.blobs.put(&object_key, bytes).await?;

        let correlation_id = self.queue.send(&object_key).await?;
        debug!(
            correlation_id = %correlation_id,
            object_key = %object_key,
            "job enqueued, waiting for result"
        );

        let result = self.waiter.wait(&correlation_id, self.wait_timeout).await?;
        Ok(Prediction {
            correlation_id,
            result,
        })
    }
}
