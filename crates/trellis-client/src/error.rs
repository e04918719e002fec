use serde::{Deserialize, Serialize};
use thiserror::Error;

use trellis_store::StoreError;

use crate::cancel::CancelReason;

/// Machine-readable classification carried by every client error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed path/workspace/missing field. Never retried.
    Validation,
    /// Requested workspace differs from the session workspace. Never retried.
    AccessDenied,
    /// Tree scope or batch too large. Never retried; caller must narrow.
    TooManyItems,
    /// Atomic batch rejected; the store is unchanged.
    TransactionFailed,
    /// Transient failures exhausted the retry budget.
    Timeout,
    /// Transient transport failure (single attempt).
    Unavailable,
    /// The caller cancelled the operation.
    Cancelled,
    /// Unexpected internal failure.
    Internal,
}

impl ErrorKind {
    /// Stable string form for wire/UI consumers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::TooManyItems => "too_many_items",
            ErrorKind::TransactionFailed => "transaction_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// True only for transient kinds worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Unavailable)
    }
}

/// Errors surfaced by the data client.
///
/// Absent documents are not errors: reads yield `None`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed path, workspace, or operation shape.
    #[error("validation failed: {reason}")]
    Validation {
        /// What was malformed.
        reason: String,
    },

    /// The requested workspace differs from the authenticated workspace.
    #[error("access denied for workspace {workspace}")]
    AccessDenied {
        /// The workspace that was requested.
        workspace: String,
    },

    /// A scan or batch exceeded its ceiling.
    #[error("too many items: {count} (max {max})")]
    TooManyItems {
        /// Number of items in scope.
        count: usize,
        /// The ceiling that was exceeded.
        max: usize,
    },

    /// An atomic batch was rejected; nothing was applied.
    #[error("transaction failed: {reason}")]
    TransactionFailed {
        /// Why the transaction was rejected.
        reason: String,
    },

    /// Transient failures exhausted the retry budget.
    #[error("operation timed out after {attempts} attempts ({timeout_ms}ms per attempt)")]
    Timeout {
        /// Attempts made before giving up.
        attempts: u32,
        /// Per-attempt timeout budget.
        timeout_ms: u64,
    },

    /// A single attempt failed at the transport.
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// What went wrong at the transport.
        reason: String,
    },

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled: {reason}")]
    Cancelled {
        /// Why the operation was cancelled.
        reason: CancelReason,
    },

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// The machine-readable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Validation { .. } => ErrorKind::Validation,
            ClientError::AccessDenied { .. } => ErrorKind::AccessDenied,
            ClientError::TooManyItems { .. } => ErrorKind::TooManyItems,
            ClientError::TransactionFailed { .. } => ErrorKind::TransactionFailed,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Unavailable { .. } => ErrorKind::Unavailable,
            ClientError::Cancelled { .. } => ErrorKind::Cancelled,
            ClientError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True only for transient errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation { reason } => ClientError::Validation { reason },
            StoreError::TooManyItems { count, max } => ClientError::TooManyItems { count, max },
            StoreError::TransactionFailed { reason } => ClientError::TransactionFailed { reason },
            StoreError::Unavailable { reason } => ClientError::Unavailable { reason },
            StoreError::Serialization(msg) => ClientError::Internal(msg),
            StoreError::Internal(msg) => ClientError::Internal(msg),
        }
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
