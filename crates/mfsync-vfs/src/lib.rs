//! MFSync VFS - Virtual file tree and attributes service
//!
//! Provides:
//! - [`MemoryFileTree`] - an in-memory implementation of the `IFileTree` port
//! - [`AttributesService`] - the bidirectional descriptor ↔ handle registry
//! - [`MutationSerializer`] - the exclusive context tree mutations run in
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use mfsync_core::events::EventBus;
//! use mfsync_vfs::{AttributesService, MemoryFileTree};
//!
//! let tree = Arc::new(MemoryFileTree::new());
//! let attributes = AttributesService::new(tree, EventBus::new());
//! let handle = attributes.get_or_create(descriptor)?;
//! ```

pub mod attributes;
pub mod error;
pub mod serializer;
pub mod tree;

pub use attributes::AttributesService;
pub use error::VfsError;
pub use serializer::{MutationHandle, MutationSerializer};
pub use tree::{MemoryFileTree, ROOT_NODE};
