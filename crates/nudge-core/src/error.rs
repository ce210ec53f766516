//! Error types for Nudge.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NudgeError>;

#[derive(Debug, Error)]
pub enum NudgeError {
    /// The reminder store failed to execute an operation.
    #[error("store error: {0}")]
    Store(String),

    #[error("reminder {0} not found")]
    NotFound(i64),

    /// Input rejected before it reached the store.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    /// A notification backend failed to deliver.
    #[error("notify error: {0}")]
    Notify(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
