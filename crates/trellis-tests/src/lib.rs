//! Trellis test & validation infrastructure.
//!
//! End-to-end scenarios over the in-memory backend, a fault-injecting store
//! wrapper for resilience testing, and property tests for the path codec.

pub mod harness;
pub mod integration;
pub mod proptest_paths;
pub mod sync_integration;

pub use harness::{init_tracing, FaultMode, FlakyStore, TestEnv};
