// Queue service boundary
//
// Decision: QueueClient abstracts the managed queue pair behind three calls.
// send() targets the request queue; receive()/delete() target the response
// queue. Implementations live in infergate-queue.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Identifier linking an enqueued request to its eventual response.
///
/// Assigned by the queue service when the request message is enqueued; the
/// sender cannot choose it in advance. The worker copies it onto the response
/// message as the `Request-Queue-Message-ID` attribute.
pub type CorrelationId = String;

/// Message attribute carrying the correlation id on response messages
pub const CORRELATION_ATTRIBUTE: &str = "Request-Queue-Message-ID";

/// One delivery received from the response queue
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Raw message body (the worker's result payload)
    pub body: String,
    /// Delivery handle required to delete this specific delivery.
    /// Identifies the delivery, not the logical message.
    pub ack_token: String,
    /// Correlation attribute, `None` when the message violates the contract
    pub correlation_id: Option<CorrelationId>,
}

/// Client for the request/response queue pair
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Enqueue a job on the request queue, returning the correlation id the
    /// response message will carry.
    async fn send(&self, body: &str) -> Result<CorrelationId>;

    /// Receive up to `max_messages` from the response queue, long-polling for
    /// at most `wait`. Undeleted messages become visible again after the
    /// configured visibility timeout.
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>>;

    /// Permanently remove one delivery from the response queue. A stale token
    /// fails softly with an error the caller may log and ignore.
    async fn delete(&self, ack_token: &str) -> Result<()>;
}
