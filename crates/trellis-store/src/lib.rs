#![warn(missing_docs)]

//! Trellis storage subsystem: path-addressed document model over a flat store.
//!
//! The backend natively supports only flat key lookup, prefix scans, and
//! bounded atomic write transactions. This crate defines the canonical
//! (workspace, path) key codec, the document model with creation/update
//! metadata, the [`DocumentStore`] trait, and an in-memory reference backend.

pub mod document;
pub mod error;
pub mod memory;
pub mod pathkey;
pub mod store;

pub use document::{dir_marker, is_dir_marker, now_millis, ActorId, Document, DocumentMeta};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use pathkey::{DocPath, StoreKey, WorkspaceId};
pub use store::{validate_transact, DocumentStore, TransactItem, MAX_TRANSACT_ITEMS};
