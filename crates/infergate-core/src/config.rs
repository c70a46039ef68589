// Engine configuration
//
// All knobs come from the environment with defaults; queue URLs are required.

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Configuration for the correlation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// URL of the request queue (jobs travel gateway -> worker)
    pub request_queue_url: String,
    /// URL of the response queue (results travel worker -> gateway)
    pub response_queue_url: String,
    /// Maximum messages per collector poll (queue services cap this at 10)
    pub poll_batch_size: usize,
    /// Pause between collector poll batches
    pub poll_interval: Duration,
    /// Upper bound for the collector's error backoff
    pub max_backoff: Duration,
    /// Long-poll wait hint passed to receive()
    pub receive_wait: Duration,
    /// Visibility timeout requested for received messages
    pub visibility_timeout: Duration,
    /// Per-request deadline for a waiter
    pub wait_timeout: Duration,
    /// Pause between waiter polls of the correlation store
    pub waiter_poll_interval: Duration,
}

impl EngineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let request_queue_url = std::env::var("REQUEST_QUEUE_URL")
            .map_err(|_| EngineError::config("REQUEST_QUEUE_URL environment variable required"))?;
        let response_queue_url = std::env::var("RESPONSE_QUEUE_URL")
            .map_err(|_| EngineError::config("RESPONSE_QUEUE_URL environment variable required"))?;

        Ok(Self {
            request_queue_url,
            response_queue_url,
            poll_batch_size: env_usize("POLL_BATCH_SIZE", 10)?,
            poll_interval: Duration::from_millis(env_u64("POLL_INTERVAL_MS", 500)?),
            max_backoff: Duration::from_millis(env_u64("POLL_MAX_BACKOFF_MS", 5_000)?),
            receive_wait: Duration::from_secs(env_u64("RECEIVE_WAIT_SECS", 0)?),
            visibility_timeout: Duration::from_secs(env_u64("VISIBILITY_TIMEOUT_SECS", 30)?),
            wait_timeout: Duration::from_secs(env_u64("WAIT_TIMEOUT_SECS", 300)?),
            waiter_poll_interval: Duration::from_millis(env_u64("WAITER_POLL_INTERVAL_MS", 100)?),
        })
    }

    /// Configuration with defaults and the given queue URLs (tests, local dev)
    pub fn for_queues(request_queue_url: impl Into<String>, response_queue_url: impl Into<String>) -> Self {
        Self {
            request_queue_url: request_queue_url.into(),
            response_queue_url: response_queue_url.into(),
            poll_batch_size: 10,
            poll_interval: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            receive_wait: Duration::ZERO,
            visibility_timeout: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(300),
            waiter_poll_interval: Duration::from_millis(100),
        }
    }

    /// Set the collector poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the collector batch size
    pub fn with_poll_batch_size(mut self, size: usize) -> Self {
        self.poll_batch_size = size.max(1);
        self
    }

    /// Set the per-request wait deadline
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// Set the waiter's store poll interval
    pub fn with_waiter_poll_interval(mut self, interval: Duration) -> Self {
        self.waiter_poll_interval = interval;
        self
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| EngineError::config(format!("{name} must be an integer, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    env_u64(name, default as u64).map(|v| v as usize)
}
