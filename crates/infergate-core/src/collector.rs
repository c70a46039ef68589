// Response collector
//
// One long-lived background task drains the response queue into the
// correlation store for the lifetime of the process. Transient queue errors
// back off and retry; only a failed preflight is fatal, and that is surfaced
// before the server starts taking traffic.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::queue::{QueueClient, QueueMessage};
use crate::store::{CorrelationStore, PendingResult};

/// Background task keeping the correlation store eventually consistent with
/// the response queue
pub struct ResponseCollector {
    queue: Arc<dyn QueueClient>,
    store: Arc<CorrelationStore>,
    config: EngineConfig,
    current_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl ResponseCollector {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        store: Arc<CorrelationStore>,
        config: EngineConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let current_interval = config.poll_interval;
        Self {
            queue,
            store,
            config,
            current_interval,
            shutdown_rx,
        }
    }

    /// Verify the response queue is reachable before the server starts.
    ///
    /// A collector that dies silently at startup leaves every future caller
    /// hanging, so an error here must abort process startup. Messages that
    /// arrive during the preflight are staged normally rather than dropped.
    pub async fn preflight(&self) -> Result<()> {
        let messages = self.queue.receive(1, Duration::ZERO).await?;
        for message in messages {
            self.handle_message(message).await;
        }
        info!("response queue reachable");
        Ok(())
    }

    /// Drain the response queue until shutdown is signalled
    pub async fn run(mut self) {
        info!(
            batch_size = self.config.poll_batch_size,
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "response collector started"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                break;
            }

            self.poll_once().await;

            if self.wait().await {
                break;
            }
        }

        info!("response collector stopped");
    }

    /// Spawn the collector onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// One receive/stage cycle. Updates the error-backoff state.
    async fn poll_once(&mut self) {
        match self
            .queue
            .receive(self.config.poll_batch_size, self.config.receive_wait)
            .await
        {
            Ok(messages) => {
                self.reset_backoff();
                if !messages.is_empty() {
                    debug!(count = messages.len(), "received response batch");
                }
                for message in messages {
                    self.handle_message(message).await;
                }
            }
            Err(e) => {
                self.increase_backoff();
                warn!(
                    error = %e,
                    retry_in_ms = self.current_interval.as_millis() as u64,
                    "response queue receive failed, backing off"
                );
            }
        }
    }

    /// Stage one delivery in the store, or drop it if it violates the contract
    async fn handle_message(&self, message: QueueMessage) {
        let QueueMessage {
            body,
            ack_token,
            correlation_id,
        } = message;

        let Some(correlation_id) = correlation_id else {
            // Protocol violation. Delete it as well, or the queue redelivers
            // the same broken message forever.
            warn!("dropping response message without correlation attribute");
            if let Err(e) = self.queue.delete(&ack_token).await {
                warn!(error = %e, "failed to delete malformed response message");
            }
            return;
        };

        debug!(correlation_id = %correlation_id, "staging response");
        self.store.insert(
            correlation_id,
            PendingResult {
                payload: body,
                ack_token,
            },
        );
    }

    /// Sleep the current interval; returns true if shutdown was signalled
    async fn wait(&mut self) -> bool {
        let mut shutdown_rx = self.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.current_interval) => false,
            _ = shutdown_rx.changed() => {
                debug!("shutdown signal received during wait");
                true
            }
        }
    }

    fn reset_backoff(&mut self) {
        self.current_interval = self.config.poll_interval;
    }

    fn increase_backoff(&mut self) {
        self.current_interval = (self.current_interval * 2).min(self.config.max_backoff);
    }

    #[cfg(test)]
    fn current_interval(&self) -> Duration {
        self.current_interval
    }
}
