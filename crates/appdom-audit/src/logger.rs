//! The per-process audit logger and handler contract.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::record::AuditRecord;

/// Errors raised by audit handlers.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One audit destination.
pub trait AuditHandler: Send + Sync {
    /// Appends one record. Handlers must not reorder records.
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// The audit logger attached to one process. When enabled, every unit of
/// work is appended to every attached handler; handler failures are logged
/// and do not fail the operation.
pub struct AuditLogger {
    enabled: AtomicBool,
    handlers: Mutex<Vec<Arc<dyn AuditHandler>>>,
}

impl AuditLogger {
    /// Creates a disabled logger with no handlers.
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Creates an enabled logger over handlers.
    pub fn enabled_with(handlers: Vec<Arc<dyn AuditHandler>>) -> Self {
        let logger = Self::new();
        for handler in handlers {
            logger.attach(handler);
        }
        logger.set_enabled(true);
        logger
    }

    /// Attaches a handler.
    pub fn attach(&self, handler: Arc<dyn AuditHandler>) {
        self.handlers.lock().unwrap().push(handler);
    }

    /// Enables or disables recording.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Returns whether recording is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Records one unit of work on every handler. Returns the number of
    /// handlers that accepted the record.
    pub fn record(&self, record: &AuditRecord) -> usize {
        if !self.is_enabled() {
            return 0;
        }
        let handlers = self.handlers.lock().unwrap();
        let mut accepted = 0;
        for handler in handlers.iter() {
            match handler.append(record) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    tracing::error!(error = %err, "audit handler failed to append record");
                }
            }
        }
        accepted
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
