// Infergate correlation engine
//
// A caller-facing dispatch blocks on a correlation id while a single
// background collector drains the response queue into a shared store. The
// queue service itself sits behind the QueueClient trait; implementations
// live in infergate-queue.

pub mod collector;
pub mod config;
pub mod error;
pub mod queue;
pub mod store;
pub mod waiter;

pub use collector::ResponseCollector;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use queue::{CorrelationId, QueueClient, QueueMessage, CORRELATION_ATTRIBUTE};
pub use store::{CorrelationStore, PendingResult};
pub use waiter::ResultWaiter;
