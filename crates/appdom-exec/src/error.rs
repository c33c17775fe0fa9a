use thiserror::Error;

use appdom_model::ModelError;

/// Errors raised while executing management operations.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no handler registered for operation {0}")]
    NoHandler(String),

    #[error("missing required parameter {0}")]
    MissingParameter(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("operation {name} does not allow wildcard address {address}")]
    WildcardNotAllowed { name: String, address: String },

    #[error("capability {0} is not registered")]
    MissingCapability(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// Convenience result alias for executor operations.
pub type Result<T> = std::result::Result<T, ExecError>;
