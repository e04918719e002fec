//! The uniform command abstraction over mutations.
//!
//! Every mutation — write, mkdir, rm, mv — runs as a command with the
//! lifecycle Created → Executing → {Committed, Failed}. On commit the
//! affected cache keys are computed purely from command shape (type, path,
//! target — never the resulting value), invalidated, and subscribers are
//! notified. On failure no invalidation happens and the command's
//! optimistic effect is rolled back.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use trellis_client::SessionContext;
use trellis_fs::{FileSystem, FsError};
use trellis_store::{DocPath, WorkspaceId};

use crate::optimistic::SyncTracker;
use crate::save_state::SaveStateTracker;

/// Unique identifier for one command execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommandId(Uuid);

impl CommandId {
    fn new() -> Self {
        CommandId(Uuid::new_v4())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd-{}", self.0)
    }
}

/// A transient mutation descriptor. Drives execution and invalidation; never
/// persisted.
#[derive(Clone, Debug)]
pub enum Command {
    /// Write a value at a path.
    Write {
        /// Target path.
        path: DocPath,
        /// Value to store; null writes a tombstone.
        value: Value,
    },
    /// Create a directory marker at a path.
    Mkdir {
        /// Target path.
        path: DocPath,
    },
    /// Remove a path and, for directories, its whole subtree.
    Rm {
        /// Target path.
        path: DocPath,
    },
    /// Move a path and its subtree to a new location.
    Mv {
        /// Source path.
        path: DocPath,
        /// Destination path.
        target: DocPath,
    },
}

impl Command {
    /// The primary path this command addresses.
    pub fn path(&self) -> &DocPath {
        match self {
            Command::Write { path, .. }
            | Command::Mkdir { path }
            | Command::Rm { path }
            | Command::Mv { path, .. } => path,
        }
    }
}

/// Command lifecycle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandState {
    /// Accepted, not yet dispatched.
    Created,
    /// Dispatched to the filesystem layer.
    Executing,
    /// Applied and invalidations published.
    Committed,
    /// Rejected or failed; no invalidation happened.
    Failed,
}

/// A cache invalidation derived from command shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invalidation {
    /// Invalidate one path: its document entry plus every tree-query and
    /// existence entry whose prefix contains it.
    Path(DocPath),
    /// Invalidate a whole subtree plus everything containing it.
    Subtree(DocPath),
}

/// Computes the affected-cache-key set for a command, purely from its shape.
/// Two commands with the same type, path, and target always produce the same
/// set, independent of values or results.
pub fn affected_cache_keys(command: &Command) -> Vec<Invalidation> {
    match command {
        Command::Write { path, .. } | Command::Mkdir { path } => {
            vec![Invalidation::Path(path.clone())]
        }
        Command::Rm { path } => vec![Invalidation::Subtree(path.clone())],
        Command::Mv { path, target } => vec![
            Invalidation::Subtree(path.clone()),
            Invalidation::Subtree(target.clone()),
        ],
    }
}

/// Lifecycle notification delivered to subscribers.
#[derive(Clone, Debug)]
pub struct CommandEvent {
    /// The command execution this event belongs to.
    pub id: CommandId,
    /// The command being executed.
    pub command: Command,
    /// Lifecycle state at the time of the event.
    pub state: CommandState,
}

/// Executes commands against the filesystem layer, feeding invalidation back
/// into the cache and notifying subscribers post-commit.
pub struct CommandBus {
    fs: Arc<FileSystem>,
    tracker: Arc<SyncTracker>,
    saves: Arc<SaveStateTracker>,
    events: broadcast::Sender<CommandEvent>,
}

impl CommandBus {
    /// Creates a bus over the given filesystem and optimistic tracker.
    pub fn new(fs: Arc<FileSystem>, tracker: Arc<SyncTracker>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            fs,
            tracker,
            saves: Arc::new(SaveStateTracker::new()),
            events,
        }
    }

    /// Subscribes to command lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    /// The per-path save states maintained by this bus.
    pub fn save_states(&self) -> &Arc<SaveStateTracker> {
        &self.saves
    }

    fn emit(&self, id: CommandId, command: &Command, state: CommandState) {
        let _ = self.events.send(CommandEvent {
            id,
            command: command.clone(),
            state,
        });
    }

    /// Executes a command in the session's workspace. Retry after a
    /// retryable failure is re-issuing the identical command.
    pub async fn execute(
        &self,
        ctx: &SessionContext,
        command: Command,
    ) -> Result<CommandId, FsError> {
        let workspace = ctx.workspace.clone();
        let id = CommandId::new();
        let path = command.path().clone();

        self.emit(id, &command, CommandState::Created);
        self.saves.set_saving(&workspace, &path);

        // Writes take effect locally before the server confirms them.
        if let Command::Write { path, value } = &command {
            let base = self
                .fs
                .client()
                .read(ctx, &workspace, path.as_str())
                .await
                .unwrap_or(None);
            self.tracker
                .add_optimistic(&workspace, path, value.clone(), base);
        }

        self.emit(id, &command, CommandState::Executing);
        let result = self.dispatch(ctx, &workspace, &command).await;

        match result {
            Ok(()) => {
                for invalidation in affected_cache_keys(&command) {
                    match invalidation {
                        Invalidation::Path(p) => {
                            self.fs.client().cache().invalidate_path(&workspace, &p)
                        }
                        Invalidation::Subtree(p) => {
                            self.fs.client().cache().invalidate_prefix(&workspace, &p)
                        }
                    }
                }
                if let Command::Write { path, value } = &command {
                    self.tracker.confirm(&workspace, path, value.clone());
                }
                self.saves.set_saved(&workspace, &path);
                self.emit(id, &command, CommandState::Committed);
                tracing::debug!("command {} committed", id);
                Ok(id)
            }
            Err(e) => {
                if let Command::Write { path, .. } = &command {
                    self.tracker.rollback(&workspace, path, e.to_string());
                }
                self.saves
                    .set_failed(&workspace, &path, e.kind_str(), e.is_retryable());
                self.emit(id, &command, CommandState::Failed);
                tracing::warn!("command {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        command: &Command,
    ) -> Result<(), FsError> {
        match command {
            Command::Write { path, value } => {
                self.fs
                    .write(ctx, workspace, path.as_str(), value.clone())
                    .await?;
                Ok(())
            }
            Command::Mkdir { path } => self.fs.mkdir(ctx, workspace, path.as_str()).await,
            Command::Rm { path } => self.fs.rm(ctx, workspace, path.as_str()).await,
            Command::Mv { path, target } => {
                self.fs
                    .mv(ctx, workspace, path.as_str(), target.as_str())
                    .await
            }
        }
    }
}
