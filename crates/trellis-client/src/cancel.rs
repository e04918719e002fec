//! Cooperative cancellation for in-flight reads.
//!
//! A cancelled read must not populate the cache and must not surface as a
//! user-visible failure past the cancellation boundary; callers receive a
//! distinct `Cancelled` error kind and drop it at the boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Reasons for cancelling an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelReason {
    /// Explicit caller cancellation.
    #[default]
    UserRequested,
    /// The caller's deadline expired.
    DeadlineExceeded,
    /// A newer operation for the same path supersedes this one.
    Superseded,
    /// The owning component is shutting down.
    Teardown,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::UserRequested => write!(f, "UserRequested"),
            CancelReason::DeadlineExceeded => write!(f, "DeadlineExceeded"),
            CancelReason::Superseded => write!(f, "Superseded"),
            CancelReason::Teardown => write!(f, "Teardown"),
        }
    }
}

/// A lightweight, cloneable cancellation token. The client checks it before
/// dispatch and again before publishing results into the cache.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<CancelReason>>>,
}

impl CancelToken {
    /// Check if this token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Get the cancellation reason if cancelled.
    pub fn cancelled_reason(&self) -> Option<CancelReason> {
        *self.reason.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The handle that triggers cancellation.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<CancelReason>>>,
}

impl CancelHandle {
    /// Trigger cancellation with the given reason. The first reason wins.
    pub fn cancel(&self, reason: CancelReason) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut r) = self.reason.lock() {
            if r.is_none() {
                *r = Some(reason);
            }
        }
    }

    /// Check if cancellation has been triggered.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Create a new cancellation token/handle pair.
pub fn new_cancel_pair() -> (CancelToken, CancelHandle) {
    let cancelled = Arc::new(AtomicBool::new(false));
    let reason = Arc::new(Mutex::new(None));

    let token = CancelToken {
        cancelled: cancelled.clone(),
        reason: reason.clone(),
    };
    let handle = CancelHandle { cancelled, reason };

    (token, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_uncancelled() {
        let (token, _handle) = new_cancel_pair();
        assert!(!token.is_cancelled());
        assert_eq!(token.cancelled_reason(), None);
    }

    #[test]
    fn test_handle_cancels_token() {
        let (token, handle) = new_cancel_pair();
        handle.cancel(CancelReason::UserRequested);
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_cancel_reason_recorded() {
        let (token, handle) = new_cancel_pair();
        handle.cancel(CancelReason::Superseded);
        assert_eq!(token.cancelled_reason(), Some(CancelReason::Superseded));
    }

    #[test]
    fn test_first_reason_wins() {
        let (token, handle) = new_cancel_pair();
        handle.cancel(CancelReason::DeadlineExceeded);
        handle.cancel(CancelReason::Teardown);
        assert_eq!(
            token.cancelled_reason(),
            Some(CancelReason::DeadlineExceeded)
        );
    }

    #[test]
    fn test_clone_observes_cancellation() {
        let (token, handle) = new_cancel_pair();
        let token2 = token.clone();
        handle.cancel(CancelReason::Teardown);
        assert!(token2.is_cancelled());
    }
}
