//! Directory-style operations over the data client.
//!
//! Directories are documents holding a reserved marker sentinel; a path with
//! descendants is a directory whether or not a marker exists. Listing is a
//! tree read constrained to immediate children. Subtree moves build their
//! complete write set first: if it fits the transaction ceiling it commits
//! atomically, otherwise it runs copy-then-delete with explicit rollback of
//! partial copies.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use trellis_client::{
    CacheKey, CachedValue, ClientError, DataClient, SessionContext,
};
use trellis_store::{
    dir_marker, is_dir_marker, DocPath, Document, StoreKey, TransactItem, WorkspaceId,
    MAX_TRANSACT_ITEMS,
};

use crate::error::{FsError, Result};

/// Filesystem emulation over a [`DataClient`].
pub struct FileSystem {
    client: Arc<DataClient>,
}

impl FileSystem {
    /// Creates a filesystem over the given client.
    pub fn new(client: Arc<DataClient>) -> Self {
        Self { client }
    }

    /// The underlying data client.
    pub fn client(&self) -> &Arc<DataClient> {
        &self.client
    }

    fn parse(path: &str) -> Result<DocPath> {
        DocPath::parse(path)
            .map_err(ClientError::from)
            .map_err(FsError::from)
    }

    /// True if a document is stored directly at the path (tombstones and
    /// markers included) or at least one document lives below it.
    pub async fn exists(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<bool> {
        let path = Self::parse(path)?;

        let key = CacheKey::Exists(path.clone());
        if let Some(CachedValue::Exists(answer)) = self.client.cache().get(workspace, &key) {
            return Ok(answer);
        }

        let answer = match self.client.scan_subtree(ctx, workspace, &path).await {
            Ok(docs) => !docs.is_empty(),
            // A subtree too large to scan certainly exists.
            Err(ClientError::TooManyItems { .. }) => true,
            Err(e) => return Err(e.into()),
        };

        self.client
            .cache()
            .insert(workspace, key, CachedValue::Exists(answer));
        Ok(answer)
    }

    /// Creates a directory by writing the reserved marker at the path.
    /// Idempotent: an existing directory is success, not an error. A plain
    /// value at the path is `NotADirectory`.
    pub async fn mkdir(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<()> {
        let parsed = Self::parse(path)?;

        match self.client.read(ctx, workspace, path).await? {
            Some(value) if is_dir_marker(&value) => {
                tracing::debug!("mkdir {}: already a directory", parsed);
                return Ok(());
            }
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(FsError::NotADirectory {
                    path: parsed.to_string(),
                });
            }
        }

        self.client.write(ctx, workspace, path, dir_marker()).await?;
        Ok(())
    }

    /// Lists the distinct immediate children of a path, sorted. Tombstoned
    /// documents are excluded; a missing path lists as empty.
    pub async fn ls(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<Vec<String>> {
        let parsed = Self::parse(path)?;
        let tree = self.client.read_tree(ctx, workspace, path).await?;

        let children: BTreeSet<String> = tree
            .keys()
            .filter_map(|p| p.first_segment_below(&parsed))
            .map(|s| s.to_string())
            .collect();
        Ok(children.into_iter().collect())
    }

    /// Reads the value at a path. Directory markers read as `None` at this
    /// level — a directory is not a value-holder.
    pub async fn read(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<Option<Value>> {
        match self.client.read(ctx, workspace, path).await? {
            Some(value) if is_dir_marker(&value) => Ok(None),
            other => Ok(other),
        }
    }

    /// Writes a value at a path. Writing over a directory marker is
    /// `NotADirectory`; the marker sentinel itself is reserved and rejected.
    pub async fn write(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
        value: Value,
    ) -> Result<Document> {
        let parsed = Self::parse(path)?;
        if is_dir_marker(&value) {
            return Err(FsError::Client(ClientError::Validation {
                reason: "the directory marker value is reserved".to_string(),
            }));
        }
        if let Some(existing) = self.client.read(ctx, workspace, path).await? {
            if is_dir_marker(&existing) {
                return Err(FsError::NotADirectory {
                    path: parsed.to_string(),
                });
            }
        }
        Ok(self.client.write(ctx, workspace, path, value).await?)
    }

    /// Removes the document at a path. A directory removes every descendant
    /// depth-first before the path itself, batched into bounded
    /// transactions. A path with nothing stored is `NotFound`.
    pub async fn rm(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<()> {
        let parsed = Self::parse(path)?;

        let docs = self.client.scan_subtree(ctx, workspace, &parsed).await?;
        if docs.is_empty() {
            return Err(FsError::NotFound {
                path: parsed.to_string(),
            });
        }

        // Deepest paths first, the target path last.
        let mut paths: Vec<DocPath> = docs.into_iter().map(|d| d.key.path).collect();
        paths.sort_by(|a, b| {
            b.depth()
                .cmp(&a.depth())
                .then_with(|| b.as_str().cmp(a.as_str()))
        });

        let total = paths.len();
        let mut removed = 0usize;
        for chunk in paths.chunks(MAX_TRANSACT_ITEMS) {
            let items: Vec<TransactItem> = chunk
                .iter()
                .map(|p| TransactItem::Delete(StoreKey::new(workspace.clone(), p.clone())))
                .collect();
            if let Err(e) = self.client.transact(ctx, workspace, items).await {
                if removed == 0 {
                    return Err(e.into());
                }
                return Err(FsError::PartialRemove {
                    removed,
                    reason: e.to_string(),
                });
            }
            removed += chunk.len();
        }

        self.client.cache().invalidate_prefix(workspace, &parsed);
        tracing::debug!("rm {}: removed {} documents", parsed, total);
        Ok(())
    }

    /// Moves a path (and its whole subtree) to a new location.
    ///
    /// The complete write set is built first. When it fits the transaction
    /// ceiling the move commits atomically; otherwise it copies then
    /// deletes, rolling partial copies back on failure so the source is
    /// never lost. Moving onto an occupied target is `AlreadyExists`; a
    /// target inside the source subtree is rejected.
    pub async fn mv(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
        target: &str,
    ) -> Result<()> {
        let source = Self::parse(path)?;
        let target = Self::parse(target)?;

        if source == target || target.is_within(&source) {
            return Err(FsError::Client(ClientError::Validation {
                reason: format!("cannot move {} into {}", source, target),
            }));
        }

        let docs = self.client.scan_subtree(ctx, workspace, &source).await?;
        if docs.is_empty() {
            return Err(FsError::NotFound {
                path: source.to_string(),
            });
        }

        let occupied = match self.client.scan_subtree(ctx, workspace, &target).await {
            Ok(existing) => !existing.is_empty(),
            Err(ClientError::TooManyItems { .. }) => true,
            Err(e) => return Err(e.into()),
        };
        if occupied {
            return Err(FsError::AlreadyExists {
                path: target.to_string(),
            });
        }

        let mut puts: Vec<TransactItem> = Vec::with_capacity(docs.len());
        let mut source_keys: Vec<StoreKey> = Vec::with_capacity(docs.len());
        let mut target_paths: Vec<DocPath> = Vec::with_capacity(docs.len());
        for src in &docs {
            // rebase cannot fail: every scanned path is within the source
            let rebased = match src.key.path.rebase(&source, &target) {
                Some(p) => p,
                None => {
                    return Err(FsError::Client(ClientError::Internal(format!(
                        "scanned path {} outside subtree {}",
                        src.key.path, source
                    ))));
                }
            };
            let mut dst = Document::new(
                StoreKey::new(workspace.clone(), rebased.clone()),
                src.value.clone(),
                ctx.actor.clone(),
            );
            dst.meta.created_at = src.meta.created_at;
            dst.meta.created_by = src.meta.created_by.clone();
            target_paths.push(rebased);
            puts.push(TransactItem::Put(dst));
            source_keys.push(src.key.clone());
        }

        if puts.len() + source_keys.len() <= MAX_TRANSACT_ITEMS {
            let mut items = puts;
            items.extend(source_keys.into_iter().map(TransactItem::Delete));
            self.client.transact(ctx, workspace, items).await?;
        } else {
            self.mv_copy_then_delete(ctx, workspace, puts, source_keys, &target_paths)
                .await?;
        }

        self.client.cache().invalidate_prefix(workspace, &source);
        self.client.cache().invalidate_prefix(workspace, &target);
        tracing::debug!("mv {} -> {}: moved {} documents", source, target, docs.len());
        Ok(())
    }

    /// Sequential copy-then-delete for moves exceeding the transaction
    /// ceiling. On copy failure, partial copies are rolled back so the
    /// source remains the single complete copy.
    async fn mv_copy_then_delete(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        puts: Vec<TransactItem>,
        source_keys: Vec<StoreKey>,
        target_paths: &[DocPath],
    ) -> Result<()> {
        let total = puts.len();
        let mut copied = 0usize;

        for chunk in puts.chunks(MAX_TRANSACT_ITEMS) {
            if let Err(e) = self.client.transact(ctx, workspace, chunk.to_vec()).await {
                let rolled_back = self
                    .rollback_copies(ctx, workspace, &target_paths[..copied])
                    .await;
                return Err(FsError::PartialMove {
                    copied,
                    rolled_back,
                    reason: e.to_string(),
                });
            }
            copied += chunk.len();
        }

        for chunk in source_keys.chunks(MAX_TRANSACT_ITEMS) {
            let items: Vec<TransactItem> =
                chunk.iter().cloned().map(TransactItem::Delete).collect();
            if let Err(e) = self.client.transact(ctx, workspace, items).await {
                // The target holds a complete copy; the source is partially
                // removed. Not rolled back: callers re-run rm on the source.
                return Err(FsError::PartialMove {
                    copied: total,
                    rolled_back: false,
                    reason: format!("source cleanup failed: {}", e),
                });
            }
        }
        Ok(())
    }

    async fn rollback_copies(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        copied: &[DocPath],
    ) -> bool {
        for chunk in copied.chunks(MAX_TRANSACT_ITEMS) {
            let items: Vec<TransactItem> = chunk
                .iter()
                .map(|p| TransactItem::Delete(StoreKey::new(workspace.clone(), p.clone())))
                .collect();
            if let Err(e) = self.client.transact(ctx, workspace, items).await {
                tracing::warn!("mv rollback failed, destination partially populated: {}", e);
                return false;
            }
        }
        true
    }
}
