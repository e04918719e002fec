#![warn(missing_docs)]

//! Trellis sync subsystem.
//!
//! The uniform command abstraction over mutations (write/mkdir/rm/mv) with
//! post-commit cache invalidation and subscriber notification, the
//! optimistic-update tracker that masks reads with unconfirmed local
//! mutations, connection-state tracking with reconnect backoff, and the
//! save-state reporting consumed by UI layers.

pub mod command;
pub mod connection;
pub mod optimistic;
pub mod save_state;

pub use command::{
    affected_cache_keys, Command, CommandBus, CommandEvent, CommandId, CommandState, Invalidation,
};
pub use connection::{ConnectionState, ConnectionTracker, ReconnectConfig};
pub use optimistic::{OptimisticUpdate, PathState, SyncTracker, UpdateId};
pub use save_state::{SaveState, SaveStateTracker};
