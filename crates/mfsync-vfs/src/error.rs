//! Error types for the virtual file tree and the attributes service.

use mfsync_core::domain::{DomainError, NodeId};
use thiserror::Error;

/// Errors that can occur while mutating the tree or the attribute maps.
#[derive(Error, Debug)]
pub enum VfsError {
    /// The node behind a handle no longer exists in the tree
    #[error("stale handle: {0}")]
    StaleHandle(NodeId),

    /// The handle has no registered descriptor
    #[error("no attributes registered for {0}")]
    NotRegistered(NodeId),

    #[error("'{name}' already exists under {parent}")]
    AlreadyExists { parent: NodeId, name: String },

    #[error("not a directory: {0}")]
    NotADirectory(NodeId),

    #[error("is a directory: {0}")]
    IsADirectory(NodeId),

    /// Moving a node below itself
    #[error("cannot move {node} under its own descendant {target}")]
    InvalidMove { node: NodeId, target: NodeId },

    /// The root node cannot be renamed, moved or deleted
    #[error("operation not permitted on the tree root")]
    RootNode,

    #[error("invalid descriptor: {0}")]
    Domain(#[from] DomainError),

    /// A tree port implementation failed
    #[error("file tree error: {0}")]
    Tree(#[from] anyhow::Error),

    #[error("mutation executor has stopped")]
    ExecutorStopped,
}
