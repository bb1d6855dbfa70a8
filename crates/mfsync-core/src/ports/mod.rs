//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! sync core. Ports are interfaces that the core depends on, but whose
//! implementations live in adapter crates or in the embedding application.
//!
//! ## Ports Overview
//!
//! - [`IRemoteTransport`] - Remote listing and byte transfer
//! - [`IFileTree`] - The virtual file tree resources are materialized into
//! - [`IContentStorage`] - Last-synced content records
//! - [`IContentAdapter`] - Local/remote content normalization
//! - [`INotificationService`] - User-facing notifications

pub mod content_adapter;
pub mod content_storage;
pub mod file_tree;
pub mod notification;
pub mod transport;

pub use content_adapter::{IContentAdapter, PassthroughAdapter, TrailingNewlineAdapter};
pub use content_storage::IContentStorage;
pub use file_tree::IFileTree;
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use transport::{
    DatasetItem, IRemoteTransport, JobItem, ListRequest, ListTarget, MemberItem, RawItem,
    ResourceLocator, SpoolItem, UssItem,
};
