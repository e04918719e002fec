use thiserror::Error;

use trellis_client::ClientError;

/// Errors surfaced by the filesystem emulation.
///
/// Partial-failure variants are distinct so callers know to re-run from a
/// known state rather than assume success.
#[derive(Debug, Error)]
pub enum FsError {
    /// Nothing exists at the path.
    #[error("no such path: {path}")]
    NotFound {
        /// The path that was addressed.
        path: String,
    },

    /// The path holds a plain value where a directory was required, or vice
    /// versa.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: String,
    },

    /// The destination of a move already exists.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// The occupied path.
        path: String,
    },

    /// A multi-transaction move failed midway. When `rolled_back` is true the
    /// source is intact and the destination clean; otherwise both sides need
    /// inspection.
    #[error("move failed after copying {copied} documents (rolled back: {rolled_back}): {reason}")]
    PartialMove {
        /// Documents copied before the failure.
        copied: usize,
        /// Whether the partial copy was successfully rolled back.
        rolled_back: bool,
        /// The underlying failure.
        reason: String,
    },

    /// A recursive removal failed midway; some descendants may remain.
    #[error("remove failed after deleting {removed} documents: {reason}")]
    PartialRemove {
        /// Documents removed before the failure.
        removed: usize,
        /// The underlying failure.
        reason: String,
    },

    /// An underlying client error.
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl FsError {
    /// Stable machine-readable kind string for wire/UI consumers.
    pub fn kind_str(&self) -> &'static str {
        match self {
            FsError::NotFound { .. } => "not_found",
            FsError::NotADirectory { .. } => "not_a_directory",
            FsError::AlreadyExists { .. } => "already_exists",
            FsError::PartialMove { .. } => "partial_move",
            FsError::PartialRemove { .. } => "partial_remove",
            FsError::Client(e) => e.kind().as_str(),
        }
    }

    /// True only for transient underlying failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            FsError::Client(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Result alias for filesystem operations.
pub type Result<T> = std::result::Result<T, FsError>;
