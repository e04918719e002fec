//! Per-call session identity and workspace enforcement.
//!
//! The authentication collaborator supplies {actor, workspace} per call. A
//! call lacking a workspace is rejected as unauthenticated; a call whose
//! requested workspace differs from the authenticated one is rejected as
//! access-denied — never silently substituted, never retried.

use trellis_store::{ActorId, WorkspaceId};

use crate::error::{ClientError, Result};

/// Authenticated identity for one call: who is acting, in which workspace.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// The authenticated caller.
    pub actor: ActorId,
    /// The workspace this session is bound to.
    pub workspace: WorkspaceId,
}

impl SessionContext {
    /// Creates a session context.
    pub fn new(actor: ActorId, workspace: WorkspaceId) -> Self {
        Self { actor, workspace }
    }

    /// Checks that the session is authenticated and that the requested
    /// workspace matches the session workspace.
    pub fn authorize(&self, requested: &WorkspaceId) -> Result<()> {
        if !self.workspace.is_valid() {
            return Err(ClientError::Validation {
                reason: "unauthenticated: session has no workspace".to_string(),
            });
        }
        if !requested.is_valid() {
            return Err(ClientError::Validation {
                reason: "requested workspace is empty or malformed".to_string(),
            });
        }
        if requested != &self.workspace {
            return Err(ClientError::AccessDenied {
                workspace: requested.to_string(),
            });
        }
        Ok(())
    }
}
