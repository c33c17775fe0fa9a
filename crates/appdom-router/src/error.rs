use thiserror::Error;

/// Errors raised while routing operations between processes.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no process registered for {0}")]
    TargetNotFound(String),

    #[error("dispatch to {target} timed out after {timeout_ms}ms")]
    TimedOut { target: String, timeout_ms: u64 },

    #[error("server {host}/{server} is stopped")]
    ServerStopped { host: String, server: String },

    #[error("remote process error: {0}")]
    Remote(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
