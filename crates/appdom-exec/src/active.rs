//! Active-operation tracking and cooperative cancellation.
//!
//! Every in-flight top-level operation is registered here so callers can
//! read back the original request or cancel it. Cancellation is
//! cooperative: the executor checks the flag between composite steps.
//! Cancel races are expected; `AlreadyCompleted` is a valid outcome.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::operation::Operation;

/// Unique identifier of an in-flight operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct OperationId(u64);

impl OperationId {
    /// Creates an operation ID from a raw u64 value.
    pub fn new(id: u64) -> Self {
        OperationId(id)
    }

    /// Returns the raw u64 value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// A cloneable cooperative cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Creates an uncancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Outcome of a cancel request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The operation was still running and is now flagged.
    Cancelled,
    /// The operation finished before the cancel arrived.
    AlreadyCompleted,
    /// No operation with that ID was ever registered.
    NotFound,
}

struct ActiveEntry {
    operation: Operation,
    started_at_ms: u64,
    flag: CancelFlag,
    completed: bool,
}

/// Registry of in-flight operations.
pub struct ActiveOperationRegistry {
    entries: DashMap<u64, ActiveEntry>,
    next_id: AtomicU64,
}

impl ActiveOperationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers an operation and returns its ID plus the flag the executor
    /// should poll.
    pub fn register(&self, operation: &Operation) -> (OperationId, CancelFlag) {
        let id = OperationId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let flag = CancelFlag::new();
        let started_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.entries.insert(
            id.as_u64(),
            ActiveEntry {
                operation: operation.clone(),
                started_at_ms,
                flag: flag.clone(),
                completed: false,
            },
        );
        tracing::debug!(operation = operation.name(), id = %id, "registered active operation");
        (id, flag)
    }

    /// Marks an operation completed. The entry stays readable until
    /// [`ActiveOperationRegistry::retire`].
    pub fn complete(&self, id: OperationId) {
        if let Some(mut entry) = self.entries.get_mut(&id.as_u64()) {
            entry.completed = true;
        }
    }

    /// Drops a completed entry.
    pub fn retire(&self, id: OperationId) {
        self.entries.remove(&id.as_u64());
    }

    /// Reads back the original request of an operation.
    pub fn get(&self, id: OperationId) -> Option<Operation> {
        self.entries.get(&id.as_u64()).map(|e| e.operation.clone())
    }

    /// Returns when the operation started, milliseconds since the epoch.
    pub fn started_at_ms(&self, id: OperationId) -> Option<u64> {
        self.entries.get(&id.as_u64()).map(|e| e.started_at_ms)
    }

    /// Requests cancellation of an operation.
    pub fn cancel(&self, id: OperationId) -> CancelOutcome {
        match self.entries.get(&id.as_u64()) {
            None => CancelOutcome::NotFound,
            Some(entry) if entry.completed => CancelOutcome::AlreadyCompleted,
            Some(entry) => {
                entry.flag.cancel();
                tracing::debug!(id = %id, "cancel requested");
                CancelOutcome::Cancelled
            }
        }
    }

    /// Lists the IDs of operations not yet completed, sorted.
    pub fn active_ids(&self) -> Vec<OperationId> {
        let mut ids: Vec<OperationId> = self
            .entries
            .iter()
            .filter(|e| !e.completed)
            .map(|e| OperationId::new(*e.key()))
            .collect();
        ids.sort_by_key(OperationId::as_u64);
        ids
    }
}

impl Default for ActiveOperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
