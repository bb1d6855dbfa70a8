//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and malformed remote identities.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid resource or node name
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Invalid USS path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid connection URL
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    /// A descriptor could not be built from a remote listing item
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
