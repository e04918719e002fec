#![warn(missing_docs)]

//! Trellis filesystem emulation.
//!
//! Directory-style semantics over the path-addressed data client. The store
//! is flat: "directory" is derived from descendant-key existence plus a
//! reserved marker document, never from a parallel tree index.

pub mod error;
pub mod fs;

pub use error::{FsError, Result};
pub use fs::FileSystem;
