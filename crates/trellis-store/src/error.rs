use thiserror::Error;

/// Errors produced by the document store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed path, workspace, or transaction shape. Never retried.
    #[error("validation failed: {reason}")]
    Validation {
        /// What was malformed.
        reason: String,
    },

    /// A scan or transaction exceeded the configured ceiling. Never retried.
    #[error("too many items: {count} (max {max})")]
    TooManyItems {
        /// Number of items requested.
        count: usize,
        /// The ceiling that was exceeded.
        max: usize,
    },

    /// An atomic transaction was rejected. The store is unchanged.
    #[error("transaction failed: {reason}")]
    TransactionFailed {
        /// Why the transaction was rejected.
        reason: String,
    },

    /// Transient transport failure; the caller may retry.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// What went wrong at the transport.
        reason: String,
    },

    /// A document value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unexpected internal failure.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Returns true if the error is a transient transport failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
