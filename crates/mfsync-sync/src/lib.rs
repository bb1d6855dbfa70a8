//! MFSync Sync - Content synchronization
//!
//! Provides:
//! - [`ContentSynchronizer`] - reconciles one file's local content with its
//!   remote copy through a save strategy
//! - [`SynchronizerRegistry`] - picks the synchronizer accepting a handle
//! - [`SyncQueues`] - one conflated work queue per synchronized file
//! - [`SyncListener`] implementations reporting pass results
//!
//! ## Modules
//!
//! - [`synchronizer`] - the reconciliation pass
//! - [`listener`] - success/failure callbacks
//! - [`registry`] - capability-based dispatch
//! - [`queue`] - per-file serialization

pub mod listener;
pub mod queue;
pub mod registry;
pub mod synchronizer;

use mfsync_conflict::ConflictError;
use mfsync_core::domain::NodeId;
use mfsync_vfs::VfsError;
use thiserror::Error;

pub use listener::{LoggingListener, NotifyingListener, SyncListener};
pub use queue::SyncQueues;
pub use registry::SynchronizerRegistry;
pub use synchronizer::{ContentSynchronizer, IContentSynchronizer};

/// Errors that can occur during content synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// The handle has no registered descriptor
    #[error("no attributes registered for {0}")]
    MissingAttributes(NodeId),

    /// No requester offers a connection to reach the resource through
    #[error("no connection available for {0}")]
    NoConnection(NodeId),

    /// Every connection tried failed; carries the last error
    #[error("transport failure for {handle}: {source}")]
    TransportFailure {
        handle: NodeId,
        #[source]
        source: anyhow::Error,
    },

    /// The save strategy produced no decision
    #[error("conflict unresolved for {handle}: {reason}")]
    ConflictUnresolved { handle: NodeId, reason: String },

    /// The save strategy failed for another reason
    #[error("save strategy failed: {0}")]
    Conflict(#[from] ConflictError),

    /// The pass was cancelled before anything was applied
    #[error("synchronization of {0} cancelled")]
    Cancelled(NodeId),

    /// Reading or writing the content sync record failed
    #[error("content storage error: {0}")]
    Storage(#[source] anyhow::Error),

    /// Reading or writing the local file failed
    #[error("local content error: {0}")]
    LocalContent(#[source] anyhow::Error),

    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error("{0} is a directory")]
    IsDirectory(NodeId),

    /// No registered synchronizer handles this file
    #[error("{0} is not accepted by any synchronizer")]
    NotAccepted(NodeId),

    #[error("{0} is already synchronized")]
    AlreadySynced(NodeId),

    /// The handle's node no longer exists
    #[error("{0} is not a valid file")]
    InvalidHandle(NodeId),
}

impl SyncError {
    /// Maps a save strategy error for `handle` into the sync taxonomy
    pub(crate) fn from_conflict(handle: NodeId, err: ConflictError) -> Self {
        match err {
            ConflictError::Unresolved { reason, .. } => SyncError::ConflictUnresolved { handle, reason },
            other => SyncError::Conflict(other),
        }
    }

    /// Whether a later pass may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransportFailure { .. }
                | SyncError::ConflictUnresolved { .. }
                | SyncError::Cancelled(_)
                | SyncError::Storage(_)
                | SyncError::LocalContent(_)
        )
    }
}
