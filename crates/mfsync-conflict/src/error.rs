//! Error types for save strategies

use thiserror::Error;

/// Errors that can occur while deciding how to reconcile a diverged file
#[derive(Debug, Error)]
pub enum ConflictError {
    /// No decision was produced (prompt cancelled, policy says fail)
    #[error("conflict unresolved for {path}: {reason}")]
    Unresolved { path: String, reason: String },

    /// The interactive collaborator failed
    #[error("conflict prompt failed: {0}")]
    PromptFailed(#[from] anyhow::Error),

    /// Invalid glob pattern in conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown strategy name in configuration
    #[error("invalid conflict strategy '{0}'; valid: ask, keep_local, accept_remote, fail")]
    InvalidStrategy(String),
}
