//! The flat document-store adapter trait.
//!
//! Backends expose only: point lookup, put, delete, segment-boundary prefix
//! scan, and a bounded atomic write transaction. Everything hierarchical is
//! built above this trait.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::pathkey::{DocPath, StoreKey, WorkspaceId};

/// Hard ceiling on items in one atomic transaction.
pub const MAX_TRANSACT_ITEMS: usize = 25;

/// One operation in an atomic write transaction.
#[derive(Clone, Debug)]
pub enum TransactItem {
    /// Insert or replace a document.
    Put(Document),
    /// Remove a document. Idempotent.
    Delete(StoreKey),
}

impl TransactItem {
    /// The key this item addresses.
    pub fn key(&self) -> &StoreKey {
        match self {
            TransactItem::Put(doc) => &doc.key,
            TransactItem::Delete(key) => key,
        }
    }
}

/// Validates the shape of a write transaction before it touches the backend.
///
/// Rejects: more than [`MAX_TRANSACT_ITEMS`] items (`TooManyItems`, never
/// silent truncation), items spanning more than one workspace, and duplicate
/// keys within one transaction.
pub fn validate_transact(items: &[TransactItem]) -> Result<()> {
    if items.len() > MAX_TRANSACT_ITEMS {
        return Err(StoreError::TooManyItems {
            count: items.len(),
            max: MAX_TRANSACT_ITEMS,
        });
    }
    let mut workspace: Option<&WorkspaceId> = None;
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for item in items {
        let key = item.key();
        match workspace {
            None => workspace = Some(&key.workspace),
            Some(ws) if ws != &key.workspace => {
                return Err(StoreError::Validation {
                    reason: format!(
                        "transaction spans workspaces {} and {}",
                        ws, key.workspace
                    ),
                });
            }
            Some(_) => {}
        }
        if !seen.insert(key.encode()) {
            return Err(StoreError::Validation {
                reason: format!("duplicate key in transaction: {}", key),
            });
        }
    }
    Ok(())
}

/// Flat document store: the only surface the backend has to offer.
///
/// `put` preserves `created_at`/`created_by` of an existing item, refreshes
/// `updated_at`/`updated_by` from the incoming document, and increments
/// `version`. `transact_write` either fully commits or leaves the store
/// exactly as before.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup. Absent key yields `None`, never an error.
    async fn get(&self, key: &StoreKey) -> Result<Option<Document>>;

    /// Insert or replace a document, merging creation metadata of any
    /// existing item. Returns the document as stored.
    async fn put(&self, doc: Document) -> Result<Document>;

    /// Remove a document. Removing an absent key is a no-op.
    async fn delete(&self, key: &StoreKey) -> Result<()>;

    /// Every document in `workspace` whose path is at or under `prefix` at a
    /// segment boundary, sorted by path.
    async fn query_by_prefix(
        &self,
        workspace: &WorkspaceId,
        prefix: &DocPath,
    ) -> Result<Vec<Document>>;

    /// Atomically apply up to [`MAX_TRANSACT_ITEMS`] puts and deletes within
    /// one workspace. On any failure the store is unchanged.
    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ActorId;
    use serde_json::json;

    fn doc(ws: &str, path: &str) -> Document {
        Document::new(
            StoreKey::new(WorkspaceId::new(ws), DocPath::parse(path).unwrap()),
            json!(1),
            ActorId::new("test"),
        )
    }

    #[test]
    fn test_validate_transact_accepts_bounded() {
        let items: Vec<_> = (0..MAX_TRANSACT_ITEMS)
            .map(|i| TransactItem::Put(doc("ws1", &format!("/n/{}", i))))
            .collect();
        assert!(validate_transact(&items).is_ok());
    }

    #[test]
    fn test_validate_transact_rejects_over_ceiling() {
        let items: Vec<_> = (0..MAX_TRANSACT_ITEMS + 1)
            .map(|i| TransactItem::Put(doc("ws1", &format!("/n/{}", i))))
            .collect();
        match validate_transact(&items) {
            Err(StoreError::TooManyItems { count, max }) => {
                assert_eq!(count, 26);
                assert_eq!(max, 25);
            }
            other => panic!("expected TooManyItems, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_transact_rejects_cross_workspace() {
        let items = vec![
            TransactItem::Put(doc("ws1", "/a")),
            TransactItem::Put(doc("ws2", "/b")),
        ];
        assert!(matches!(
            validate_transact(&items),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_transact_rejects_duplicate_keys() {
        let items = vec![
            TransactItem::Put(doc("ws1", "/a")),
            TransactItem::Delete(doc("ws1", "/a").key),
        ];
        assert!(matches!(
            validate_transact(&items),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_transact_empty_is_ok() {
        assert!(validate_transact(&[]).is_ok());
    }
}
