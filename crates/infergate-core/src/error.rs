// Error types for the correlation engine

use std::time::Duration;

use thiserror::Error;

use crate::queue::CorrelationId;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while correlating requests with responses
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transient queue service failure (send/receive/delete round trip)
    #[error("queue error: {0}")]
    Queue(String),

    /// Response message violated the wire contract
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// No matching response arrived before the wait deadline
    #[error("timed out after {waited:?} waiting for response to {correlation_id}")]
    WaitTimeout {
        correlation_id: CorrelationId,
        waited: Duration,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    /// Create a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        EngineError::Queue(msg.into())
    }

    /// Create a protocol violation error
    pub fn protocol(msg: impl Into<String>) -> Self {
        EngineError::Protocol(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Configuration(msg.into())
    }

    /// True for the timeout variant, which callers surface as a
    /// request-timeout-class failure rather than a server error
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::WaitTimeout { .. })
    }
}
