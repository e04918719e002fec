//! Per-path save-state reporting for UI consumers.
//!
//! Derived from command outcomes: Saving while a command is in flight,
//! Saved on commit, SaveFailed with the machine-readable error kind on
//! failure. Retry re-issues the identical command; the tracker flips back
//! to Saving when it does.

use dashmap::DashMap;

use trellis_store::{DocPath, WorkspaceId};

/// User-visible save state of one path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveState {
    /// A command for this path is in flight.
    Saving,
    /// The last command committed.
    Saved,
    /// The last command failed.
    SaveFailed {
        /// Machine-readable error kind.
        kind: String,
        /// Whether re-issuing the identical command may succeed.
        retryable: bool,
    },
}

/// Tracks the save state of every path touched by a command.
pub struct SaveStateTracker {
    states: DashMap<(WorkspaceId, DocPath), SaveState>,
}

impl SaveStateTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Marks a path as saving.
    pub fn set_saving(&self, workspace: &WorkspaceId, path: &DocPath) {
        self.states
            .insert((workspace.clone(), path.clone()), SaveState::Saving);
    }

    /// Marks a path as saved.
    pub fn set_saved(&self, workspace: &WorkspaceId, path: &DocPath) {
        self.states
            .insert((workspace.clone(), path.clone()), SaveState::Saved);
    }

    /// Marks a path as failed with a machine-readable kind.
    pub fn set_failed(
        &self,
        workspace: &WorkspaceId,
        path: &DocPath,
        kind: impl Into<String>,
        retryable: bool,
    ) {
        self.states.insert(
            (workspace.clone(), path.clone()),
            SaveState::SaveFailed {
                kind: kind.into(),
                retryable,
            },
        );
    }

    /// The save state of a path, if any command has touched it.
    pub fn get(&self, workspace: &WorkspaceId, path: &DocPath) -> Option<SaveState> {
        self.states
            .get(&(workspace.clone(), path.clone()))
            .map(|s| s.clone())
    }

    /// Drops the state entry for a path.
    pub fn clear(&self, workspace: &WorkspaceId, path: &DocPath) {
        self.states.remove(&(workspace.clone(), path.clone()));
    }

    /// Number of paths currently in the saving state for a workspace.
    pub fn saving_count(&self, workspace: &WorkspaceId) -> usize {
        self.states
            .iter()
            .filter(|entry| &entry.key().0 == workspace && *entry.value() == SaveState::Saving)
            .count()
    }
}

impl Default for SaveStateTracker {
    fn default() -> Self {
        Self::new()
    }
}
