//! Callbacks reporting the result of each synchronize pass

use std::sync::Arc;

use mfsync_core::config::SyncConfig;
use mfsync_core::domain::{NodeId, SyncOutcome};
use mfsync_core::ports::{IFileTree, INotificationService, Notification};
use tracing::{info, warn};

use crate::SyncError;

/// Observer of finished synchronize passes
#[async_trait::async_trait]
pub trait SyncListener: Send + Sync {
    async fn on_success(&self, handle: NodeId, outcome: SyncOutcome);

    async fn on_failure(&self, handle: NodeId, error: &SyncError);
}

/// Logs pass results; the default listener
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

#[async_trait::async_trait]
impl SyncListener for LoggingListener {
    async fn on_success(&self, handle: NodeId, outcome: SyncOutcome) {
        info!(handle = %handle, outcome = %outcome, "File synchronized");
    }

    async fn on_failure(&self, handle: NodeId, error: &SyncError) {
        warn!(handle = %handle, error = %error, "File synchronization failed");
    }
}

/// Turns failed passes into user-facing notifications
pub struct NotifyingListener {
    notifier: Arc<dyn INotificationService>,
    tree: Arc<dyn IFileTree>,
    enabled: bool,
}

impl NotifyingListener {
    pub fn new(notifier: Arc<dyn INotificationService>, tree: Arc<dyn IFileTree>) -> Self {
        Self {
            notifier,
            tree,
            enabled: true,
        }
    }

    /// Disables notifications while still logging (`sync.notify_on_failure`)
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Applies `notify_on_failure`
    pub fn with_config(self, config: &SyncConfig) -> Self {
        self.with_enabled(config.notify_on_failure)
    }
}

#[async_trait::async_trait]
impl SyncListener for NotifyingListener {
    async fn on_success(&self, handle: NodeId, outcome: SyncOutcome) {
        LoggingListener.on_success(handle, outcome).await;
    }

    async fn on_failure(&self, handle: NodeId, error: &SyncError) {
        LoggingListener.on_failure(handle, error).await;
        // A cancelled pass was asked for, not failed.
        if !self.enabled || matches!(error, SyncError::Cancelled(_)) {
            return;
        }

        let file = self
            .tree
            .name(handle)
            .unwrap_or_else(|| handle.to_string());
        let notification = Notification::sync_failure(
            format!("Cannot synchronize file \"{file}\""),
            error.to_string(),
        );
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(handle = %handle, error = %e, "Failed to deliver sync failure notification");
        }
    }
}
