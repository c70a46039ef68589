// Correlation store
//
// Shared index from correlation id to the staged result. Inserted into only
// by the ResponseCollector, drained only by ResultWaiters. DashMap::remove
// gives the atomic check-and-claim: a given id is never observed present by
// two concurrent try_take calls.

use dashmap::DashMap;

use crate::queue::CorrelationId;

/// A result staged for pickup by its waiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    /// Raw result body from the response message
    pub payload: String,
    /// Delivery handle for deleting the response message once consumed
    pub ack_token: String,
}

/// Concurrent map from correlation id to pending result
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: DashMap<CorrelationId, PendingResult>,
}

impl CorrelationStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Stage a result. Overwrites any existing entry for the id:
    /// duplicate deliveries resolve last-write-wins.
    pub fn insert(&self, correlation_id: CorrelationId, result: PendingResult) {
        self.entries.insert(correlation_id, result);
    }

    /// Atomically remove and return the entry for the id, if present.
    /// Absence is not an error; the waiter polls until its entry appears.
    pub fn try_take(&self, correlation_id: &str) -> Option<PendingResult> {
        self.entries.remove(correlation_id).map(|(_, result)| result)
    }

    /// Number of staged results awaiting pickup
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
