//! Per-file conflated sync queues
//!
//! Each synchronized file owns one worker task fed by a single-slot channel.
//! Triggers that arrive while a pass is running collapse into exactly one
//! follow-up pass; a file never has two passes in flight and never builds an
//! unbounded backlog. Different files run fully in parallel.
//!
//! ```text
//! trigger ─► [slot: 0..1] ─► worker ─► synchronizer.synchronize(handle)
//! trigger ─┘ (full: dropped, a pass is already pending)
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use mfsync_core::config::SyncConfig;
use mfsync_core::domain::NodeId;
use mfsync_core::events::AttributesEvent;
use mfsync_vfs::AttributesService;

use crate::registry::SynchronizerRegistry;
use crate::synchronizer::IContentSynchronizer;
use crate::SyncError;

struct FileQueue {
    tx: mpsc::Sender<()>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    synchronizer: Arc<dyn IContentSynchronizer>,
}

/// Owner of every per-file sync queue
pub struct SyncQueues {
    registry: SynchronizerRegistry,
    attributes: Arc<AttributesService>,
    queues: DashMap<NodeId, FileQueue>,
    shutdown: CancellationToken,
    auto_sync: bool,
}

impl SyncQueues {
    pub fn new(registry: SynchronizerRegistry, attributes: Arc<AttributesService>) -> Self {
        Self {
            registry,
            attributes,
            queues: DashMap::new(),
            shutdown: CancellationToken::new(),
            auto_sync: true,
        }
    }

    /// Whether descriptor updates of synced files trigger a pass (`sync.auto_sync`)
    pub fn with_auto_sync(mut self, enabled: bool) -> Self {
        self.auto_sync = enabled;
        self
    }

    pub fn with_config(self, config: &SyncConfig) -> Self {
        self.with_auto_sync(config.auto_sync)
    }

    /// Starts synchronizing `handle` and queues its first pass
    pub fn start_sync(&self, handle: NodeId) -> Result<(), SyncError> {
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled(handle));
        }
        if self.attributes.get_attributes(handle).is_none() {
            return Err(SyncError::MissingAttributes(handle));
        }
        let tree = self.attributes.tree();
        if !tree.is_valid(handle) {
            return Err(SyncError::InvalidHandle(handle));
        }
        if tree.is_directory(handle) {
            return Err(SyncError::IsDirectory(handle));
        }
        let synchronizer = self
            .registry
            .resolve(handle)
            .ok_or(SyncError::NotAccepted(handle))?;

        match self.queues.entry(handle) {
            Entry::Occupied(_) => Err(SyncError::AlreadySynced(handle)),
            Entry::Vacant(slot) => {
                let (tx, rx) = mpsc::channel(1);
                let cancel = self.shutdown.child_token();
                let task = tokio::spawn(run_worker(
                    handle,
                    synchronizer.clone(),
                    rx,
                    cancel.clone(),
                ));
                // Fresh channel: the first slot is free.
                let _ = tx.try_send(());
                slot.insert(FileQueue {
                    tx,
                    cancel,
                    task,
                    synchronizer,
                });
                info!(handle = %handle, "Sync started");
                Ok(())
            }
        }
    }

    /// Requests another pass; returns false if the file is not synchronized
    pub fn trigger_sync(&self, handle: NodeId) -> bool {
        let Some(queue) = self.queues.get(&handle) else {
            return false;
        };
        match queue.tx.try_send(()) {
            Ok(()) => {
                trace!(handle = %handle, "Sync pass queued");
                true
            }
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!(handle = %handle, "Sync pass already pending");
                true
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }

    pub fn is_synced(&self, handle: NodeId) -> bool {
        self.queues.contains_key(&handle)
    }

    pub fn synced_count(&self) -> usize {
        self.queues.len()
    }

    /// Stops synchronizing `handle`, cancelling any pass in flight
    pub async fn remove_sync(&self, handle: NodeId) -> bool {
        let Some((_, queue)) = self.queues.remove(&handle) else {
            return false;
        };
        queue.cancel.cancel();
        drop(queue.tx);
        if let Err(e) = queue.task.await {
            warn!(handle = %handle, error = %e, "Sync worker ended abnormally");
        }
        queue.synchronizer.forget(handle).await;
        info!(handle = %handle, "Sync removed");
        true
    }

    /// Cancels every queue and waits for the workers to stop
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<NodeId> = self.queues.iter().map(|q| *q.key()).collect();
        for handle in handles {
            self.remove_sync(handle).await;
        }
        info!("Sync queues shut down");
    }

    /// Follows attribute events: updates re-sync, deletions remove the queue
    pub fn spawn_event_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let queues = Arc::clone(self);
        let mut events = self.attributes.events().subscribe_attributes();

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = queues.shutdown.cancelled() => break,
                    event = events.recv() => event,
                };

                match event {
                    Ok(AttributesEvent::Updated { handle, .. }) => {
                        if queues.auto_sync && queues.trigger_sync(handle) {
                            debug!(handle = %handle, "Descriptor updated, re-syncing");
                        }
                    }
                    Ok(AttributesEvent::Deleted { handle, .. }) => {
                        queues.remove_sync(handle).await;
                    }
                    Ok(AttributesEvent::Created { .. }) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Sync queues lagged behind attribute events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Sync event listener stopped");
        })
    }
}

async fn run_worker(
    handle: NodeId,
    synchronizer: Arc<dyn IContentSynchronizer>,
    mut rx: mpsc::Receiver<()>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => next,
        };
        if next.is_none() {
            break;
        }
        // Failures are reported through the synchronizer's listener.
        let _ = synchronizer.synchronize(handle, &cancel).await;
    }
    trace!(handle = %handle, "Sync worker stopped");
}
