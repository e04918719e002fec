//! The path-addressed data client.
//!
//! Reads are cache-first; misses fetch from the store with bounded retry and
//! a per-attempt timeout, then populate the cache. Writes go straight to the
//! store and feed invalidation back into the cache. Concurrent writers are
//! not merged: whichever write commits last at the store wins, and readers
//! converge after that commit's invalidation.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use trellis_store::{
    validate_transact, DocPath, Document, DocumentStore, StoreKey, TransactItem, WorkspaceId,
};

use crate::batch::{validate_batch, BatchOpResult, BatchOperation};
use crate::cache::{CacheConfig, CacheKey, CachedValue, DocumentCache};
use crate::cancel::CancelToken;
use crate::error::{ClientError, Result};
use crate::retry::{RetryConfig, RetryExecutor, RetryOutcome};
use crate::session::SessionContext;

/// Data client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-attempt timeout, independent of retry backoff (default: 5s).
    pub call_timeout: Duration,
    /// Ceiling on tree-read result counts (default: 1000). Exceeding it
    /// fails with TooManyItems rather than silently truncating.
    pub tree_read_limit: usize,
    /// Retry behavior for transient transport failures.
    pub retry: RetryConfig,
    /// Cache behavior.
    pub cache: CacheConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(5),
            tree_read_limit: 1000,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Options for cancellation-aware reads.
#[derive(Clone, Default)]
pub struct ReadOptions {
    /// Cooperative cancellation token. A cancelled read never populates the
    /// cache.
    pub cancel: Option<CancelToken>,
    /// Skip the cache lookup and fetch from the store (the result still
    /// refreshes the cache).
    pub bypass_cache: bool,
}

/// Path-addressed client over a [`DocumentStore`].
pub struct DataClient {
    store: Arc<dyn DocumentStore>,
    cache: Arc<DocumentCache>,
    retry: RetryExecutor,
    config: ClientConfig,
}

impl DataClient {
    /// Creates a client with its own cache built from the configuration.
    pub fn new(store: Arc<dyn DocumentStore>, config: ClientConfig) -> Self {
        let cache = Arc::new(DocumentCache::new(config.cache.clone()));
        Self::with_cache(store, cache, config)
    }

    /// Creates a client sharing an externally owned cache. The cache is an
    /// explicit injected component so tests and the command layer can reach
    /// it directly.
    pub fn with_cache(
        store: Arc<dyn DocumentStore>,
        cache: Arc<DocumentCache>,
        config: ClientConfig,
    ) -> Self {
        Self {
            store,
            cache,
            retry: RetryExecutor::new(config.retry.clone()),
            config,
        }
    }

    /// The cache this client populates and invalidates.
    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    /// The configured tree-read ceiling.
    pub fn tree_read_limit(&self) -> usize {
        self.config.tree_read_limit
    }

    /// Runs a store operation with a per-attempt timeout and bounded retry.
    /// Exhausted transient failures surface as Timeout; permanent errors
    /// surface as themselves on the first attempt.
    async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = trellis_store::Result<T>>,
    {
        let timeout = self.config.call_timeout;
        let op = &op;
        let outcome = self
            .retry
            .execute(move || async move {
                match tokio::time::timeout(timeout, op()).await {
                    Ok(result) => result.map_err(ClientError::from),
                    Err(_) => Err(ClientError::Unavailable {
                        reason: format!("attempt timed out after {}ms", timeout.as_millis()),
                    }),
                }
            })
            .await;
        match outcome {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::Exhausted {
                last_error,
                attempts,
            } => {
                if last_error.is_retryable() {
                    tracing::warn!(
                        "store operation exhausted {} attempts: {}",
                        attempts,
                        last_error
                    );
                    Err(ClientError::Timeout {
                        attempts,
                        timeout_ms: timeout.as_millis() as u64,
                    })
                } else {
                    Err(last_error)
                }
            }
        }
    }

    fn parse_path(path: &str) -> Result<DocPath> {
        DocPath::parse(path).map_err(ClientError::from)
    }

    fn check_cancelled(cancel: Option<&CancelToken>) -> Result<()> {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Err(ClientError::Cancelled {
                    reason: token.cancelled_reason().unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    /// Reads the value at a path. Absent documents yield `None`, never an
    /// error; a tombstoned document yields `Some(Value::Null)`.
    pub async fn read(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<Option<Value>> {
        self.read_with_options(ctx, workspace, path, ReadOptions::default())
            .await
    }

    /// Cancellation-aware read. A cancelled read returns `Cancelled` and
    /// never populates the cache.
    pub async fn read_with_options(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
        options: ReadOptions,
    ) -> Result<Option<Value>> {
        ctx.authorize(workspace)?;
        let path = Self::parse_path(path)?;
        Self::check_cancelled(options.cancel.as_ref())?;

        let key = CacheKey::Doc(path.clone());
        if !options.bypass_cache {
            if let Some(CachedValue::Doc(value)) = self.cache.get(workspace, &key) {
                return Ok(value);
            }
        }

        let store_key = StoreKey::new(workspace.clone(), path);
        let doc = self.run(|| self.store.get(&store_key)).await?;
        let value = doc.map(|d| d.value);

        Self::check_cancelled(options.cancel.as_ref())?;
        self.cache
            .insert(workspace, key, CachedValue::Doc(value.clone()));
        Ok(value)
    }

    /// Reads the value at a path, substituting `default` when the document
    /// is absent or tombstoned. The returned flag reports whether the
    /// default was used.
    pub async fn read_with_default(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
        default: Value,
    ) -> Result<(Value, bool)> {
        match self.read(ctx, workspace, path).await? {
            None | Some(Value::Null) => Ok((default, true)),
            Some(value) => Ok((value, false)),
        }
    }

    /// Reads every non-tombstoned document at or under `prefix` at a segment
    /// boundary ("/ab" never matches prefix "/a"). A match count above the
    /// configured ceiling fails with TooManyItems rather than truncating.
    pub async fn read_tree(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        prefix: &str,
    ) -> Result<BTreeMap<DocPath, Value>> {
        ctx.authorize(workspace)?;
        let prefix = Self::parse_path(prefix)?;

        let key = CacheKey::Tree(prefix.clone());
        if let Some(CachedValue::Tree(tree)) = self.cache.get(workspace, &key) {
            return Ok(tree);
        }

        let docs = self
            .run(|| self.store.query_by_prefix(workspace, &prefix))
            .await?;
        if docs.len() > self.config.tree_read_limit {
            return Err(ClientError::TooManyItems {
                count: docs.len(),
                max: self.config.tree_read_limit,
            });
        }

        let tree: BTreeMap<DocPath, Value> = docs
            .into_iter()
            .filter(|d| !d.is_tombstone())
            .map(|d| (d.key.path, d.value))
            .collect();

        self.cache
            .insert(workspace, key, CachedValue::Tree(tree.clone()));
        Ok(tree)
    }

    /// Uncached raw scan of a subtree, including tombstones and directory
    /// markers. Low-level surface for subtree moves and removals.
    pub async fn scan_subtree(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        prefix: &DocPath,
    ) -> Result<Vec<Document>> {
        ctx.authorize(workspace)?;
        let docs = self
            .run(|| self.store.query_by_prefix(workspace, prefix))
            .await?;
        if docs.len() > self.config.tree_read_limit {
            return Err(ClientError::TooManyItems {
                count: docs.len(),
                max: self.config.tree_read_limit,
            });
        }
        Ok(docs)
    }

    /// Writes a value at a path. A null value writes a tombstone, distinct
    /// from delete. Creation metadata of an existing document is preserved;
    /// update metadata is refreshed. Invalidates the path, its containing
    /// listings, and existence entries.
    pub async fn write(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
        value: Value,
    ) -> Result<Document> {
        ctx.authorize(workspace)?;
        let path = Self::parse_path(path)?;

        let doc = Document::new(
            StoreKey::new(workspace.clone(), path.clone()),
            value,
            ctx.actor.clone(),
        );
        let stored = self
            .run(|| {
                let doc = doc.clone();
                async move { self.store.put(doc).await }
            })
            .await?;

        self.cache.invalidate_path(workspace, &path);
        Ok(stored)
    }

    /// Removes the document at a path outright (unlike a tombstone, nothing
    /// remains). Idempotent. Same invalidation as write.
    pub async fn delete(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        path: &str,
    ) -> Result<()> {
        ctx.authorize(workspace)?;
        let path = Self::parse_path(path)?;

        let store_key = StoreKey::new(workspace.clone(), path.clone());
        self.run(|| self.store.delete(&store_key)).await?;

        self.cache.invalidate_path(workspace, &path);
        Ok(())
    }

    /// Atomically applies up to 25 puts and deletes within the session
    /// workspace, invalidating every touched path on commit. Low-level
    /// surface for multi-document moves and removals.
    pub async fn transact(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        items: Vec<TransactItem>,
    ) -> Result<()> {
        ctx.authorize(workspace)?;
        for item in &items {
            if &item.key().workspace != workspace {
                return Err(ClientError::AccessDenied {
                    workspace: item.key().workspace.to_string(),
                });
            }
        }
        validate_transact(&items)?;

        let paths: Vec<DocPath> = items.iter().map(|i| i.key().path.clone()).collect();
        self.run(|| {
            let items = items.clone();
            async move { self.store.transact_write(items).await }
        })
        .await?;

        for path in &paths {
            self.cache.invalidate_path(workspace, path);
        }
        Ok(())
    }

    /// Executes an ordered batch of 1..=25 reads and writes. Reads observe
    /// pre-batch state; writes commit in one atomic transaction — on failure
    /// the store is left exactly as before and the whole call errs, so
    /// callers treat failure as a complete no-op.
    pub async fn batch(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        ops: Vec<BatchOperation>,
    ) -> Result<Vec<BatchOpResult>> {
        ctx.authorize(workspace)?;
        validate_batch(&ops)?;

        // All reads run before the write transaction so every read in the
        // batch observes pre-batch state.
        let mut read_values: Vec<Option<Value>> = Vec::new();
        for op in &ops {
            if let BatchOperation::Read { path } = op {
                let store_key = StoreKey::new(workspace.clone(), path.clone());
                let doc = self.run(|| self.store.get(&store_key)).await?;
                read_values.push(doc.map(|d| d.value));
            }
        }

        let writes: Vec<TransactItem> = ops
            .iter()
            .filter_map(|op| match op {
                BatchOperation::Write { path, value } => Some(TransactItem::Put(Document::new(
                    StoreKey::new(workspace.clone(), path.clone()),
                    value.clone(),
                    ctx.actor.clone(),
                ))),
                BatchOperation::Read { .. } => None,
            })
            .collect();

        if !writes.is_empty() {
            validate_transact(&writes)?;
            let write_paths: Vec<DocPath> =
                writes.iter().map(|i| i.key().path.clone()).collect();
            self.run(|| {
                let items = writes.clone();
                async move { self.store.transact_write(items).await }
            })
            .await?;
            for path in &write_paths {
                self.cache.invalidate_path(workspace, path);
            }
        }

        let mut reads = read_values.into_iter();
        let results = ops
            .into_iter()
            .map(|op| match op {
                BatchOperation::Read { .. } => BatchOpResult::Read(
                    reads.next().flatten(),
                ),
                BatchOperation::Write { path, .. } => BatchOpResult::Written(path),
            })
            .collect();
        Ok(results)
    }
}
