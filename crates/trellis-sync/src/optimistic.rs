//! Optimistic-update tracking.
//!
//! A local mutation is shown to readers before the server confirms it. At
//! most one pending update is authoritative per (workspace, path): a newer
//! update supersedes an older unconfirmed one but keeps the original
//! known-good base, so a rollback always lands on confirmed state. A path's
//! display state is a tagged variant, never one mutable field.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use trellis_client::{CacheKey, CachedValue, DocumentCache};
use trellis_store::{now_millis, DocPath, WorkspaceId};

/// Unique identifier for an optimistic update.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpdateId(Uuid);

impl UpdateId {
    fn new() -> Self {
        UpdateId(Uuid::new_v4())
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upd-{}", self.0)
    }
}

/// A locally applied, unconfirmed mutation.
#[derive(Clone, Debug)]
pub struct OptimisticUpdate {
    /// Unique id of this update.
    pub id: UpdateId,
    /// The path the update applies to.
    pub path: DocPath,
    /// The pending value shown to readers.
    pub value: Value,
    /// Epoch-millis timestamp of local application.
    pub applied_at: u64,
}

/// Display state of a path as seen by a reader.
#[derive(Clone, Debug, PartialEq)]
pub enum PathState {
    /// The server-confirmed value.
    Confirmed(Value),
    /// A locally applied value awaiting confirmation.
    Pending {
        /// The unconfirmed value.
        value: Value,
        /// Epoch-millis timestamp of local application.
        since: u64,
    },
    /// The last update failed and was rolled back.
    RolledBack {
        /// Why the update was rolled back.
        reason: String,
    },
}

struct PendingEntry {
    update: OptimisticUpdate,
    /// Confirmed value before the first unconfirmed update; restored on
    /// rollback. `None` means the path had no document.
    last_known_good: Option<Value>,
}

/// Tracks in-flight local mutations and reconciles them against confirmed
/// state.
pub struct SyncTracker {
    cache: Arc<DocumentCache>,
    pending: DashMap<(WorkspaceId, DocPath), PendingEntry>,
    rolled_back: DashMap<(WorkspaceId, DocPath), String>,
}

impl SyncTracker {
    /// Creates a tracker that refreshes the given cache on confirmation and
    /// rollback.
    pub fn new(cache: Arc<DocumentCache>) -> Self {
        Self {
            cache,
            pending: DashMap::new(),
            rolled_back: DashMap::new(),
        }
    }

    /// Applies a local mutation ahead of server confirmation. Reads of the
    /// path are masked with `value` until confirmed or rolled back. A newer
    /// update supersedes an older unconfirmed one; the known-good base of
    /// the first pending update is kept.
    pub fn add_optimistic(
        &self,
        workspace: &WorkspaceId,
        path: &DocPath,
        value: Value,
        last_known_good: Option<Value>,
    ) -> OptimisticUpdate {
        let update = OptimisticUpdate {
            id: UpdateId::new(),
            path: path.clone(),
            value,
            applied_at: now_millis(),
        };
        let key = (workspace.clone(), path.clone());
        self.rolled_back.remove(&key);
        match self.pending.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                tracing::debug!(
                    "superseding pending update {} at {}",
                    occupied.get().update.id,
                    path
                );
                occupied.get_mut().update = update.clone();
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(PendingEntry {
                    update: update.clone(),
                    last_known_good,
                });
            }
        }
        update
    }

    /// Overlays the pending value (if any) onto a confirmed read.
    pub fn masked_read(
        &self,
        workspace: &WorkspaceId,
        path: &DocPath,
        confirmed: Option<Value>,
    ) -> Option<Value> {
        let key = (workspace.clone(), path.clone());
        match self.pending.get(&key) {
            Some(entry) => Some(entry.update.value.clone()),
            None => confirmed,
        }
    }

    /// Server confirmation for a path: clears the pending entry and
    /// refreshes the cache from the confirmed value.
    pub fn confirm(&self, workspace: &WorkspaceId, path: &DocPath, confirmed: Value) {
        let key = (workspace.clone(), path.clone());
        self.pending.remove(&key);
        self.rolled_back.remove(&key);
        self.cache.insert(
            workspace,
            CacheKey::Doc(path.clone()),
            CachedValue::Doc(Some(confirmed)),
        );
    }

    /// Rolls a failed update back to the last known-good value, returning
    /// it. The cache is restored so readers immediately see confirmed state.
    pub fn rollback(
        &self,
        workspace: &WorkspaceId,
        path: &DocPath,
        reason: impl Into<String>,
    ) -> Option<Value> {
        let key = (workspace.clone(), path.clone());
        let entry = self.pending.remove(&key).map(|(_, e)| e)?;
        let reason = reason.into();
        tracing::debug!("rolling back pending update at {}: {}", path, reason);
        self.cache.insert(
            workspace,
            CacheKey::Doc(path.clone()),
            CachedValue::Doc(entry.last_known_good.clone()),
        );
        self.rolled_back.insert(key, reason);
        entry.last_known_good
    }

    /// Clears every pending entry for a workspace, restoring known-good
    /// values. Used on reconnect, before re-syncing from the server. Returns
    /// the number of entries rolled back.
    pub fn rollback_all(&self, workspace: &WorkspaceId, reason: impl Into<String>) -> usize {
        let reason = reason.into();
        let paths: Vec<DocPath> = self
            .pending
            .iter()
            .filter(|entry| &entry.key().0 == workspace)
            .map(|entry| entry.key().1.clone())
            .collect();
        for path in &paths {
            self.rollback(workspace, path, reason.clone());
        }
        paths.len()
    }

    /// The display state of a path, if this tracker or the cache knows it.
    pub fn state(&self, workspace: &WorkspaceId, path: &DocPath) -> Option<PathState> {
        let key = (workspace.clone(), path.clone());
        if let Some(entry) = self.pending.get(&key) {
            return Some(PathState::Pending {
                value: entry.update.value.clone(),
                since: entry.update.applied_at,
            });
        }
        if let Some(reason) = self.rolled_back.get(&key) {
            return Some(PathState::RolledBack {
                reason: reason.clone(),
            });
        }
        match self.cache.get(workspace, &CacheKey::Doc(path.clone())) {
            Some(CachedValue::Doc(Some(value))) => Some(PathState::Confirmed(value)),
            _ => None,
        }
    }

    /// Number of unconfirmed updates in a workspace.
    pub fn pending_count(&self, workspace: &WorkspaceId) -> usize {
        self.pending
            .iter()
            .filter(|entry| &entry.key().0 == workspace)
            .count()
    }

    /// True if the workspace has unconfirmed local mutations.
    pub fn is_dirty(&self, workspace: &WorkspaceId) -> bool {
        self.pending_count(workspace) > 0
    }
}
