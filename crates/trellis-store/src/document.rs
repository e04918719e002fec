//! Document model: value plus creation/update metadata.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pathkey::StoreKey;

/// Identifies the caller that created or updated a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Creates a new ActorId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the actor ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time as milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Creation and update metadata carried by every document.
///
/// `created_at`/`created_by` are fixed at first write and preserved across
/// updates by the store adapter. `version` increments on every put; it is
/// exposed for caller-side optimistic-concurrency checks and never enforced
/// by this layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Epoch-millis timestamp of the first write.
    pub created_at: u64,
    /// Actor that performed the first write.
    pub created_by: ActorId,
    /// Epoch-millis timestamp of the latest write.
    pub updated_at: u64,
    /// Actor that performed the latest write.
    pub updated_by: ActorId,
    /// Monotonically increasing write counter, starting at 1.
    pub version: u64,
}

/// One stored document: (workspace, path) → value + metadata.
///
/// The value is arbitrary JSON. `Value::Null` is a tombstone — "exists but
/// cleared" — distinct from a document that was never written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Composite (workspace, path) key.
    pub key: StoreKey,
    /// Arbitrary JSON value; null means tombstoned.
    pub value: Value,
    /// Creation/update metadata.
    pub meta: DocumentMeta,
}

impl Document {
    /// Creates a fresh document as written by `actor` now. The store adapter
    /// preserves the creation fields of any existing item on put.
    pub fn new(key: StoreKey, value: Value, actor: ActorId) -> Self {
        let now = now_millis();
        Self {
            key,
            value,
            meta: DocumentMeta {
                created_at: now,
                created_by: actor.clone(),
                updated_at: now,
                updated_by: actor,
                version: 1,
            },
        }
    }

    /// Returns true if the document is a tombstone (null value).
    pub fn is_tombstone(&self) -> bool {
        self.value.is_null()
    }

    /// Returns true if the document holds the directory-marker sentinel.
    pub fn is_dir_marker(&self) -> bool {
        is_dir_marker(&self.value)
    }
}

/// Field name distinguishing the directory sentinel from user values.
const MARKER_FIELD: &str = "$type";
/// Sentinel type tag for directory markers.
const MARKER_DIRECTORY: &str = "directory";

/// The reserved sentinel value written at directory paths.
pub fn dir_marker() -> Value {
    let mut obj = serde_json::Map::with_capacity(1);
    obj.insert(
        MARKER_FIELD.to_string(),
        Value::String(MARKER_DIRECTORY.to_string()),
    );
    Value::Object(obj)
}

/// Returns true if the value is the reserved directory-marker sentinel.
pub fn is_dir_marker(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| {
            obj.len() == 1
                && obj.get(MARKER_FIELD).and_then(Value::as_str) == Some(MARKER_DIRECTORY)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathkey::{DocPath, WorkspaceId};
    use serde_json::json;

    fn key(path: &str) -> StoreKey {
        StoreKey::new(WorkspaceId::new("ws1"), DocPath::parse(path).unwrap())
    }

    #[test]
    fn test_new_document_meta() {
        let doc = Document::new(key("/a"), json!({"x": 1}), ActorId::new("alice"));
        assert_eq!(doc.meta.version, 1);
        assert_eq!(doc.meta.created_by.as_str(), "alice");
        assert_eq!(doc.meta.created_at, doc.meta.updated_at);
    }

    #[test]
    fn test_tombstone() {
        let doc = Document::new(key("/a"), Value::Null, ActorId::new("alice"));
        assert!(doc.is_tombstone());
        let doc = Document::new(key("/a"), json!(0), ActorId::new("alice"));
        assert!(!doc.is_tombstone());
    }

    #[test]
    fn test_dir_marker_detection() {
        assert!(is_dir_marker(&dir_marker()));
        assert!(!is_dir_marker(&json!({"$type": "directory", "extra": 1})));
        assert!(!is_dir_marker(&json!({"$type": "swot"})));
        assert!(!is_dir_marker(&json!("directory")));
        assert!(!is_dir_marker(&Value::Null));
    }

    #[test]
    fn test_marker_distinct_from_user_values() {
        let doc = Document::new(key("/d"), dir_marker(), ActorId::new("alice"));
        assert!(doc.is_dir_marker());
        assert!(!doc.is_tombstone());
    }
}
