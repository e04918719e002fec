//! Test harness: environment builders and fault injection.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use trellis_client::{ClientConfig, DataClient, SessionContext};
use trellis_fs::FileSystem;
use trellis_store::{
    ActorId, DocPath, Document, DocumentStore, MemoryStore, StoreError, StoreKey, TransactItem,
    WorkspaceId,
};
use trellis_sync::{CommandBus, SyncTracker};

/// Fully wired stack over an in-memory store.
pub struct TestEnv {
    /// The backing store.
    pub store: Arc<MemoryStore>,
    /// Data client over the store.
    pub client: Arc<DataClient>,
    /// Filesystem emulation over the client.
    pub fs: Arc<FileSystem>,
    /// Optimistic-update tracker sharing the client cache.
    pub tracker: Arc<SyncTracker>,
    /// Command bus over the filesystem.
    pub bus: CommandBus,
}

impl TestEnv {
    /// Builds a stack with default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Builds a stack with the given client configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(DataClient::new(store.clone(), config));
        let tracker = Arc::new(SyncTracker::new(client.cache().clone()));
        let fs = Arc::new(FileSystem::new(client.clone()));
        let bus = CommandBus::new(fs.clone(), tracker.clone());
        Self {
            store,
            client,
            fs,
            tracker,
            bus,
        }
    }

    /// A session for `actor` bound to `workspace`.
    pub fn session(&self, actor: &str, workspace: &str) -> (SessionContext, WorkspaceId) {
        let ws = WorkspaceId::new(workspace);
        (SessionContext::new(ActorId::new(actor), ws.clone()), ws)
    }

    /// Seeds the store with (path, value) fixtures through the client.
    pub async fn seed(
        &self,
        ctx: &SessionContext,
        workspace: &WorkspaceId,
        fixtures: &[(&str, Value)],
    ) -> anyhow::Result<()> {
        for (path, value) in fixtures {
            self.client
                .write(ctx, workspace, path, value.clone())
                .await
                .with_context(|| format!("seeding {}", path))?;
        }
        Ok(())
    }
}

/// Installs a compact tracing subscriber honoring `RUST_LOG`. Safe to call
/// from every test; repeat installations are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// How the flaky store fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Fail the next N calls with a transient error, then recover.
    FailTimes(u32),
    /// Fail every call.
    AlwaysFail,
}

/// Fault-injecting [`DocumentStore`] wrapper: fails calls with transient
/// errors according to its mode, delegating to an in-memory store otherwise.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_remaining: AtomicU32,
    always_fail: std::sync::atomic::AtomicBool,
    transact_calls: AtomicU32,
    transact_fail_from: AtomicU32,
}

impl FlakyStore {
    /// Creates a healthy flaky store over an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_remaining: AtomicU32::new(0),
            always_fail: std::sync::atomic::AtomicBool::new(false),
            transact_calls: AtomicU32::new(0),
            transact_fail_from: AtomicU32::new(0),
        }
    }

    /// Fails every transaction from the nth call on (1-based), leaving
    /// point reads/writes and scans healthy. Targets mid-operation failures
    /// in multi-transaction flows.
    pub fn fail_transact_from(&self, n: u32) {
        self.transact_fail_from.store(n, Ordering::SeqCst);
    }

    fn check_transact(&self) -> Result<(), StoreError> {
        let call = self.transact_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let from = self.transact_fail_from.load(Ordering::SeqCst);
        if from > 0 && call >= from {
            return Err(StoreError::Unavailable {
                reason: format!("injected transact fault (call {})", call),
            });
        }
        Ok(())
    }

    /// Arms the fault injector.
    pub fn inject(&self, mode: FaultMode) {
        match mode {
            FaultMode::FailTimes(n) => {
                self.always_fail.store(false, Ordering::SeqCst);
                self.fail_remaining.store(n, Ordering::SeqCst);
            }
            FaultMode::AlwaysFail => {
                self.always_fail.store(true, Ordering::SeqCst);
            }
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                reason: "injected fault".to_string(),
            });
        }
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .fail_remaining
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(StoreError::Unavailable {
                reason: format!("injected fault ({} remaining)", remaining - 1),
            });
        }
        Ok(())
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &StoreKey) -> Result<Option<Document>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn put(&self, doc: Document) -> Result<Document, StoreError> {
        self.check()?;
        self.inner.put(doc).await
    }

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn query_by_prefix(
        &self,
        workspace: &WorkspaceId,
        prefix: &DocPath,
    ) -> Result<Vec<Document>, StoreError> {
        self.check()?;
        self.inner.query_by_prefix(workspace, prefix).await
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), StoreError> {
        self.check()?;
        self.check_transact()?;
        self.inner.transact_write(items).await
    }
}
