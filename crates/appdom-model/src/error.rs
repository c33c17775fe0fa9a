use thiserror::Error;

/// Errors raised by model tree operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("resource not found at {0}")]
    ResourceNotFound(String),

    #[error("resource already exists at {0}")]
    ResourceExists(String),

    #[error("parent resource not found for {0}")]
    ParentNotFound(String),

    #[error("resource at {0} still has children")]
    HasChildren(String),

    #[error("attribute {name} not found on {address}")]
    AttributeNotFound { address: String, name: String },

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("no description registered for resource type {0}")]
    NoDescription(String),
}

/// Convenience result alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
