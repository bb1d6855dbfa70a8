//! Error types for query reloads.

use mfsync_core::domain::NodeId;
use mfsync_vfs::VfsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// The listing call failed; the previous cache entry is kept
    #[error("failed to list {query}: {source}")]
    TransportFailure {
        query: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("reload of {0} was cancelled")]
    Cancelled(String),

    /// A member or spool listing whose library or job is not registered
    #[error("parent {0} of the query is not registered")]
    MissingParent(NodeId),

    #[error(transparent)]
    Vfs(#[from] VfsError),
}
