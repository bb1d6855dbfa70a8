//! Shared fakes and setup for synchronizer integration tests
//!
//! The fake transport serves one mutable remote payload, records every
//! fetch and upload, can fail selected connections and can hold fetches
//! behind a gate until the test releases them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use mfsync_cache::MemoryContentStorage;
use mfsync_conflict::{ConflictFile, IConflictPrompt, ISaveStrategy};
use mfsync_core::domain::{
    Connection, ConnectionId, ContentMode, DatasetAttributes, DatasetOrganization, NodeId, Query,
    QueryRequest, RemoteDescriptor, Requester, SaveDecision, SyncOutcome,
};
use mfsync_core::events::EventBus;
use mfsync_core::ports::{IRemoteTransport, ListRequest, RawItem, ResourceLocator};
use mfsync_sync::{ContentSynchronizer, SyncError, SyncListener};
use mfsync_vfs::{AttributesService, MemoryFileTree, MutationHandle, MutationSerializer};

pub const URL: &str = "https://zosmf:443";

// ============================================================================
// FakeTransport
// ============================================================================

pub struct FakeTransport {
    content: Mutex<Vec<u8>>,
    failing: Mutex<Vec<String>>,
    gated: AtomicBool,
    gate: Semaphore,
    pub fetches: AtomicUsize,
    pub fetched_via: Mutex<Vec<(String, ResourceLocator)>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            content: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            fetches: AtomicUsize::new(0),
            fetched_via: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

impl FakeTransport {
    pub fn with_content(content: &[u8]) -> Arc<Self> {
        let transport = Self::default();
        transport.set_remote(content);
        Arc::new(transport)
    }

    pub fn set_remote(&self, content: &[u8]) {
        *self.content.lock().unwrap() = content.to_vec();
    }

    pub fn remote(&self) -> Vec<u8> {
        self.content.lock().unwrap().clone()
    }

    pub fn fail_connection(&self, name: &str) {
        self.failing.lock().unwrap().push(name.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Holds every later fetch until [`FakeTransport::release`] hands out permits
    pub fn close_gate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, passes: usize) {
        self.gate.add_permits(passes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn upload_payloads(&self) -> Vec<Vec<u8>> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    fn check(&self, connection: &Connection) -> anyhow::Result<()> {
        if self
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|n| n == connection.name())
        {
            anyhow::bail!("HTTP 503 from {}", connection.name());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IRemoteTransport for FakeTransport {
    async fn list_resources(
        &self,
        _connection: &Connection,
        _request: &ListRequest,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<RawItem>> {
        Ok(Vec::new())
    }

    async fn fetch_bytes(
        &self,
        connection: &Connection,
        resource: &ResourceLocator,
        _mode: &ContentMode,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await?.forget();
        }
        self.fetched_via
            .lock()
            .unwrap()
            .push((connection.name().to_string(), resource.clone()));
        self.check(connection)?;
        Ok(self.remote())
    }

    async fn upload_bytes(
        &self,
        connection: &Connection,
        _resource: &ResourceLocator,
        _mode: &ContentMode,
        bytes: &[u8],
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        self.check(connection)?;
        self.uploads
            .lock()
            .unwrap()
            .push((connection.name().to_string(), bytes.to_vec()));
        self.set_remote(bytes);
        Ok(())
    }
}

// ============================================================================
// Prompt & listener
// ============================================================================

/// Prompt answering a fixed decision and counting calls
pub struct CountingPrompt {
    answer: Option<SaveDecision>,
    pub calls: AtomicUsize,
}

impl CountingPrompt {
    pub fn new(answer: Option<SaveDecision>) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IConflictPrompt for CountingPrompt {
    async fn ask(
        &self,
        _file: &ConflictFile,
        _last_synced: &[u8],
        _remote: &[u8],
    ) -> anyhow::Result<Option<SaveDecision>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

pub type PassResult = (NodeId, Result<SyncOutcome, String>);

/// Forwards every pass result to a channel
pub struct RecordingListener {
    tx: mpsc::UnboundedSender<PassResult>,
}

impl RecordingListener {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PassResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait::async_trait]
impl SyncListener for RecordingListener {
    async fn on_success(&self, handle: NodeId, outcome: SyncOutcome) {
        let _ = self.tx.send((handle, Ok(outcome)));
    }

    async fn on_failure(&self, handle: NodeId, error: &SyncError) {
        let _ = self.tx.send((handle, Err(error.to_string())));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub tree: Arc<MemoryFileTree>,
    pub attributes: Arc<AttributesService>,
    pub transport: Arc<FakeTransport>,
    pub storage: Arc<MemoryContentStorage>,
    pub mutations: MutationHandle,
    pub listener: Arc<RecordingListener>,
    pub results: mpsc::UnboundedReceiver<PassResult>,
}

impl Harness {
    /// Must be called inside a tokio runtime
    pub fn new(remote: &[u8]) -> Self {
        let tree = Arc::new(MemoryFileTree::new());
        let attributes = Arc::new(AttributesService::new(tree.clone(), EventBus::new()));
        let (mutations, _task) = MutationSerializer::spawn(64);
        let (listener, results) = RecordingListener::new();
        Self {
            tree,
            attributes,
            transport: FakeTransport::with_content(remote),
            storage: Arc::new(MemoryContentStorage::new()),
            mutations,
            listener,
            results,
        }
    }

    pub fn synchronizer(&self, strategy: Arc<dyn ISaveStrategy>) -> ContentSynchronizer {
        ContentSynchronizer::new(
            self.attributes.clone(),
            self.transport.clone(),
            self.storage.clone(),
            strategy,
            self.mutations.clone(),
        )
        .with_listener(self.listener.clone())
    }

    pub async fn next_result(&mut self) -> PassResult {
        tokio::time::timeout(std::time::Duration::from_secs(5), self.results.recv())
            .await
            .expect("timed out waiting for a sync pass")
            .expect("listener channel closed")
    }
}

// ============================================================================
// Descriptors
// ============================================================================

pub fn connection(name: &str) -> Connection {
    Connection::new(ConnectionId::new(), name, URL, "IBMUSER").unwrap()
}

pub fn requester(conn: &Connection) -> Requester {
    Query::new(
        conn.clone(),
        QueryRequest::DatasetMask {
            mask: "HLQ.*".to_string(),
            volser: None,
        },
    )
    .requester()
}

pub fn dataset(name: &str, org: DatasetOrganization, requesters: Vec<Requester>) -> RemoteDescriptor {
    RemoteDescriptor::Dataset(DatasetAttributes {
        name: name.to_string(),
        volser: Some("VOL1".to_string()),
        organization: org,
        record_format: Some("FB".to_string()),
        record_length: Some(80),
        migrated: false,
        length: 0,
        url: URL.to_string(),
        content_mode: ContentMode::text(),
        requesters,
    })
}

pub fn sequential(name: &str, requesters: Vec<Requester>) -> RemoteDescriptor {
    dataset(name, DatasetOrganization::Sequential, requesters)
}
