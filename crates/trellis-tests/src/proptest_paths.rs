//! Property-based tests for the path codec.

use proptest::prelude::*;

/// Generates a valid path segment.
pub fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z0-9_-]{1,12}"
}

/// Generates a valid absolute path with 1..=5 segments.
pub fn arb_path() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_segment(), 1..=5).prop_map(|segs| format!("/{}", segs.join("/")))
}
