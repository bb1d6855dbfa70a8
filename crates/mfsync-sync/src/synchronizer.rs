//! Content synchronizer
//!
//! One synchronize pass for a file:
//!
//! ```text
//! attributes ──► fetch (each requester connection in turn) ──► adapt
//!                                                               │
//!        first pass? ── yes ──► write local + create record ◄───┤
//!                                                               │
//!        local == fetched? ── yes ──► no-op                     │
//!                                                               ▼
//!                         save strategy(last synced, fetched)
//!                           │                        │
//!                      KeepLocal                AcceptRemote
//!               upload, normalize local      overwrite local
//!                   update record             update record
//! ```
//!
//! Remote calls race the pass's cancellation token. Nothing local is written
//! and the content sync record is untouched until the remote payload has
//! been fully received, so a failed or cancelled pass retries from the same
//! baseline.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mfsync_conflict::{ConflictFile, ISaveStrategy};
use mfsync_core::domain::{
    Connection, ContentMode, NodeId, RecordId, RemoteDescriptor, Requester, ResourceKind,
    SaveDecision, SyncOutcome,
};
use mfsync_core::ports::{
    IContentAdapter, IContentStorage, IRemoteTransport, PassthroughAdapter, ResourceLocator,
};
use mfsync_vfs::{AttributesService, MutationHandle};

use crate::listener::{LoggingListener, SyncListener};
use crate::SyncError;

/// Resource kinds whose nodes carry content
pub const CONTENT_KINDS: [ResourceKind; 4] = [
    ResourceKind::Dataset,
    ResourceKind::Member,
    ResourceKind::Uss,
    ResourceKind::SpoolFile,
];

// ============================================================================
// IContentSynchronizer
// ============================================================================

/// Reconciles local and remote content of files it accepts
#[async_trait::async_trait]
pub trait IContentSynchronizer: Send + Sync {
    /// Whether this synchronizer handles `handle`
    fn accepts(&self, handle: NodeId) -> bool;

    /// Runs one reconciliation pass
    ///
    /// Callers must not overlap passes for the same file.
    async fn synchronize(
        &self,
        handle: NodeId,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError>;

    /// Last successfully synchronized content; empty if never synchronized
    async fn successful_content(&self, handle: NodeId) -> Result<Vec<u8>, SyncError>;

    /// Whether local edits were made since the last successful pass
    fn is_upload_needed(&self, handle: NodeId) -> bool;

    fn mark_content_changed(&self, handle: NodeId);

    fn mark_not_needed(&self, handle: NodeId);

    /// Drops all per-file state of a deleted file
    async fn forget(&self, handle: NodeId);
}

/// Where a file's content lives remotely and how to reach it
struct RemoteTarget {
    locator: ResourceLocator,
    connections: Vec<Connection>,
}

// ============================================================================
// ContentSynchronizer
// ============================================================================

/// Default synchronizer for datasets, members, USS files and spool files
pub struct ContentSynchronizer {
    attributes: Arc<AttributesService>,
    transport: Arc<dyn IRemoteTransport>,
    storage: Arc<dyn IContentStorage>,
    strategy: Arc<dyn ISaveStrategy>,
    adapter: Arc<dyn IContentAdapter>,
    mutations: MutationHandle,
    listener: Arc<dyn SyncListener>,
    kinds: Vec<ResourceKind>,
    records: DashMap<NodeId, RecordId>,
    upload_needed: DashSet<NodeId>,
}

impl ContentSynchronizer {
    pub fn new(
        attributes: Arc<AttributesService>,
        transport: Arc<dyn IRemoteTransport>,
        storage: Arc<dyn IContentStorage>,
        strategy: Arc<dyn ISaveStrategy>,
        mutations: MutationHandle,
    ) -> Self {
        Self {
            attributes,
            transport,
            storage,
            strategy,
            adapter: Arc::new(PassthroughAdapter),
            mutations,
            listener: Arc::new(LoggingListener),
            kinds: CONTENT_KINDS.to_vec(),
            records: DashMap::new(),
            upload_needed: DashSet::new(),
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn IContentAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn SyncListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Restricts the resource kinds this synchronizer accepts
    pub fn with_kinds(mut self, kinds: &[ResourceKind]) -> Self {
        self.kinds = kinds.iter().copied().filter(|k| CONTENT_KINDS.contains(k)).collect();
        self
    }

    /// Whether `handle` completed at least one pass this session
    pub fn was_synchronized(&self, handle: NodeId) -> bool {
        self.records.contains_key(&handle)
    }

    // ========================================================================
    // Remote side
    // ========================================================================

    fn remote_target(
        &self,
        handle: NodeId,
        descriptor: &RemoteDescriptor,
    ) -> Result<RemoteTarget, SyncError> {
        let (locator, requesters) = match descriptor {
            RemoteDescriptor::Dataset(ds) => (
                ResourceLocator::Dataset {
                    name: ds.name.clone(),
                    volser: ds.volser.clone(),
                },
                ds.requesters.clone(),
            ),
            RemoteDescriptor::Uss(uss) => (
                ResourceLocator::UssFile {
                    path: uss.path.clone(),
                },
                uss.requesters.clone(),
            ),
            RemoteDescriptor::Member(member) => match self.attributes.get_attributes(member.library) {
                Some(RemoteDescriptor::Dataset(library)) => (
                    ResourceLocator::Member {
                        library: library.name.clone(),
                        member: member.name.clone(),
                    },
                    parent_or_own(&library.requesters, &member.requesters),
                ),
                _ => return Err(SyncError::MissingAttributes(member.library)),
            },
            RemoteDescriptor::SpoolFile(spool) => match self.attributes.get_attributes(spool.job) {
                Some(RemoteDescriptor::Job(job)) => (
                    ResourceLocator::SpoolFile {
                        job_name: job.job_name.clone(),
                        job_id: job.job_id.clone(),
                        spool_id: spool.id,
                    },
                    parent_or_own(&job.requesters, &spool.requesters),
                ),
                _ => return Err(SyncError::MissingAttributes(spool.job)),
            },
            RemoteDescriptor::Job(_) => return Err(SyncError::IsDirectory(handle)),
        };

        let mut connections: Vec<Connection> = Vec::with_capacity(requesters.len());
        for requester in requesters {
            if !connections.contains(&requester.connection) {
                connections.push(requester.connection);
            }
        }
        if connections.is_empty() {
            return Err(SyncError::NoConnection(handle));
        }

        Ok(RemoteTarget {
            locator,
            connections,
        })
    }

    /// Fetches through each connection in turn; the first success wins
    async fn fetch_remote(
        &self,
        handle: NodeId,
        target: &RemoteTarget,
        mode: &ContentMode,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, SyncError> {
        let mut last_error = None;

        for connection in &target.connections {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled(handle)),
                r = self.transport.fetch_bytes(connection, &target.locator, mode, cancel) => r,
            };

            match result {
                Ok(bytes) => {
                    debug!(handle = %handle, connection = connection.name(), bytes = bytes.len(), "Fetched remote content");
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(handle = %handle, connection = connection.name(), error = %e, "Fetch failed, trying next connection");
                    last_error = Some(e);
                }
            }
        }

        Err(SyncError::TransportFailure {
            handle,
            source: last_error.unwrap_or_else(|| anyhow::anyhow!("no connection attempted")),
        })
    }

    async fn upload_remote(
        &self,
        handle: NodeId,
        target: &RemoteTarget,
        mode: &ContentMode,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(), SyncError> {
        let mut last_error = None;

        for connection in &target.connections {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SyncError::Cancelled(handle)),
                r = self.transport.upload_bytes(connection, &target.locator, mode, bytes, cancel) => r,
            };

            match result {
                Ok(()) => {
                    info!(handle = %handle, connection = connection.name(), bytes = bytes.len(), "Uploaded local content");
                    return Ok(());
                }
                Err(e) => {
                    warn!(handle = %handle, connection = connection.name(), error = %e, "Upload failed, trying next connection");
                    last_error = Some(e);
                }
            }
        }

        Err(SyncError::TransportFailure {
            handle,
            source: last_error.unwrap_or_else(|| anyhow::anyhow!("no connection attempted")),
        })
    }

    // ========================================================================
    // Local side
    // ========================================================================

    async fn read_local(&self, handle: NodeId) -> Result<Vec<u8>, SyncError> {
        let tree = self.attributes.tree().clone();
        self.mutations
            .run(move || tree.read_bytes(handle))
            .await?
            .map_err(SyncError::LocalContent)
    }

    async fn write_local(&self, handle: NodeId, bytes: Vec<u8>) -> Result<(), SyncError> {
        let tree = self.attributes.tree().clone();
        self.mutations
            .run(move || tree.write_bytes(handle, &bytes))
            .await?
            .map_err(SyncError::LocalContent)
    }

    fn record_of(&self, handle: NodeId) -> Option<RecordId> {
        self.records.get(&handle).map(|r| *r.value())
    }

    async fn write_record(&self, record: RecordId, bytes: &[u8]) -> Result<(), SyncError> {
        self.storage
            .write(record, bytes)
            .await
            .map_err(SyncError::Storage)
    }

    // ========================================================================
    // The pass
    // ========================================================================

    /// One reconciliation pass over `handle`
    ///
    /// On `KeepLocal` the local file and the sync record both receive
    /// `adapt_from_remote` of the uploaded bytes, not the raw local bytes.
    async fn run_pass(
        &self,
        handle: NodeId,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError> {
        let descriptor = self
            .attributes
            .get_attributes(handle)
            .ok_or(SyncError::MissingAttributes(handle))?;
        if descriptor.is_directory() {
            return Err(SyncError::IsDirectory(handle));
        }

        info!(handle = %handle, resource = %descriptor, "Synchronizing file");

        let target = self.remote_target(handle, &descriptor)?;
        let mode = descriptor.content_mode();
        let fetched = self.fetch_remote(handle, &target, &mode, cancel).await?;
        let adapted = self.adapter.adapt_from_remote(fetched, handle, &descriptor);

        let Some(record) = self.record_of(handle) else {
            info!(handle = %handle, "Setting initial content");
            self.write_local(handle, adapted.clone()).await?;
            let record = self
                .storage
                .create_record()
                .await
                .map_err(SyncError::Storage)?;
            self.write_record(record, &adapted).await?;
            self.records.insert(handle, record);
            return Ok(SyncOutcome::InitialContent);
        };

        let local = self.read_local(handle).await?;
        let last_synced = self
            .storage
            .read(record)
            .await
            .map_err(SyncError::Storage)?;

        if local == adapted {
            if last_synced != adapted {
                self.write_record(record, &adapted).await?;
            }
            debug!(handle = %handle, "Local and remote content match");
            return Ok(SyncOutcome::Unchanged);
        }

        let file = ConflictFile::new(
            handle,
            self.attributes
                .tree()
                .path(handle)
                .unwrap_or_else(|| descriptor.name()),
        );
        let mut decision = self
            .strategy
            .decide(&file, &last_synced, &adapted)
            .await
            .map_err(|e| SyncError::from_conflict(handle, e))?;

        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled(handle));
        }

        if decision == SaveDecision::KeepLocal && !descriptor.is_writable() {
            warn!(handle = %handle, "Resource is read-only, discarding local edits");
            decision = SaveDecision::AcceptRemote;
        }

        info!(handle = %handle, decision = %decision, "Save strategy decided");

        match decision {
            SaveDecision::KeepLocal => {
                let prepared = self.adapter.adapt_to_remote(local, handle, &descriptor);
                self.upload_remote(handle, &target, &mode, &prepared, cancel)
                    .await?;
                let normalized = self
                    .adapter
                    .adapt_from_remote(prepared, handle, &descriptor);
                self.write_local(handle, normalized.clone()).await?;
                self.write_record(record, &normalized).await?;
                Ok(SyncOutcome::Uploaded)
            }
            SaveDecision::AcceptRemote => {
                self.write_local(handle, adapted.clone()).await?;
                self.write_record(record, &adapted).await?;
                Ok(SyncOutcome::AcceptedRemote)
            }
        }
    }
}

/// Requesters of the parent resource, or the file's own when the parent has none
fn parent_or_own(parent: &[Requester], own: &[Requester]) -> Vec<Requester> {
    if parent.is_empty() {
        own.to_vec()
    } else {
        parent.to_vec()
    }
}

#[async_trait::async_trait]
impl IContentSynchronizer for ContentSynchronizer {
    fn accepts(&self, handle: NodeId) -> bool {
        self.attributes
            .get_attributes(handle)
            .is_some_and(|d| self.kinds.contains(&d.kind()) && !d.is_directory())
    }

    async fn synchronize(
        &self,
        handle: NodeId,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, SyncError> {
        let result = self.run_pass(handle, cancel).await;
        match &result {
            Ok(outcome) => {
                self.upload_needed.remove(&handle);
                self.listener.on_success(handle, *outcome).await;
            }
            Err(e) => self.listener.on_failure(handle, e).await,
        }
        result
    }

    async fn successful_content(&self, handle: NodeId) -> Result<Vec<u8>, SyncError> {
        match self.record_of(handle) {
            Some(record) => self.storage.read(record).await.map_err(SyncError::Storage),
            None => Ok(Vec::new()),
        }
    }

    fn is_upload_needed(&self, handle: NodeId) -> bool {
        self.upload_needed.contains(&handle)
    }

    fn mark_content_changed(&self, handle: NodeId) {
        self.upload_needed.insert(handle);
    }

    fn mark_not_needed(&self, handle: NodeId) {
        self.upload_needed.remove(&handle);
    }

    async fn forget(&self, handle: NodeId) {
        self.upload_needed.remove(&handle);
        if let Some((_, record)) = self.records.remove(&handle) {
            if let Err(e) = self.storage.remove(record).await {
                warn!(handle = %handle, record = %record, error = %e, "Failed to drop content record");
            }
            debug!(handle = %handle, "Forgot synchronized file");
        }
    }
}
