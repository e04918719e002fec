//! In-memory reference backend.
//!
//! A `RwLock<BTreeMap>` keyed by the canonical key encoding. Keys within one
//! workspace sort by path, so prefix scans walk the map in path order.
//! Transactions validate fully, then apply under a single write guard.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::pathkey::{DocPath, StoreKey, WorkspaceId};
use crate::store::{validate_transact, DocumentStore, TransactItem};

/// In-memory document store. The reference backend for tests and local runs.
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of documents across all workspaces.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Returns true if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_put(data: &mut BTreeMap<String, Document>, mut doc: Document) -> Document {
        let encoded = doc.key.encode();
        if let Some(existing) = data.get(&encoded) {
            doc.meta.created_at = existing.meta.created_at;
            doc.meta.created_by = existing.meta.created_by.clone();
            doc.meta.version = existing.meta.version + 1;
        }
        data.insert(encoded, doc.clone());
        doc
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Document>> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(data.get(&key.encode()).cloned())
    }

    async fn put(&self, doc: Document) -> Result<Document> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(Self::apply_put(&mut data, doc))
    }

    async fn delete(&self, key: &StoreKey) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        data.remove(&key.encode());
        Ok(())
    }

    async fn query_by_prefix(
        &self,
        workspace: &WorkspaceId,
        prefix: &DocPath,
    ) -> Result<Vec<Document>> {
        let data = self
            .data
            .read()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let ws_prefix = StoreKey::workspace_prefix(workspace);
        let mut result = Vec::new();
        for (encoded, doc) in data.range(ws_prefix.clone()..) {
            if !encoded.starts_with(&ws_prefix) {
                break;
            }
            if doc.key.path.is_within(prefix) {
                result.push(doc.clone());
            }
        }
        Ok(result)
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<()> {
        validate_transact(&items)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        for item in items {
            match item {
                TransactItem::Put(doc) => {
                    Self::apply_put(&mut data, doc);
                }
                TransactItem::Delete(key) => {
                    data.remove(&key.encode());
                }
            }
        }
        Ok(())
    }
}
