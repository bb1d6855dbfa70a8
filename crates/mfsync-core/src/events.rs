//! In-process event bus
//!
//! Publishes attribute lifecycle events (`created`, `updated`, `deleted`)
//! and cache events (`cache_updated`, `cache_cleaned`, `fetch_failed`) to any
//! number of observers over `tokio::sync::broadcast` channels.
//!
//! Publishing is fire-and-forget: a send with no subscribers is not an
//! error, and a subscriber that falls behind by more than the channel
//! capacity observes `RecvError::Lagged` and skips ahead.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::domain::descriptor::RemoteDescriptor;
use crate::domain::newtypes::NodeId;
use crate::domain::query::Query;

/// Default capacity of each broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Attribute lifecycle events emitted by the attributes service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AttributesEvent {
    Created {
        handle: NodeId,
        descriptor: RemoteDescriptor,
    },
    Updated {
        handle: NodeId,
        old: RemoteDescriptor,
        new: RemoteDescriptor,
    },
    Deleted {
        handle: NodeId,
        descriptor: RemoteDescriptor,
    },
}

impl AttributesEvent {
    pub fn handle(&self) -> NodeId {
        match self {
            AttributesEvent::Created { handle, .. }
            | AttributesEvent::Updated { handle, .. }
            | AttributesEvent::Deleted { handle, .. } => *handle,
        }
    }
}

/// Cache events emitted by the fetch provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CacheEvent {
    /// The handle set of `query` changed (empty after a failed reload)
    CacheUpdated { query: Query, handles: Vec<NodeId> },
    /// The cache entry of `query` was dropped
    CacheCleaned { query: Query },
    /// A reload of `query` failed
    FetchFailed { query: Query, message: String },
}

/// Broadcast hub shared by the attributes service and fetch providers
#[derive(Debug, Clone)]
pub struct EventBus {
    attributes: broadcast::Sender<AttributesEvent>,
    cache: broadcast::Sender<CacheEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (attributes, _) = broadcast::channel(capacity);
        let (cache, _) = broadcast::channel(capacity);
        Self { attributes, cache }
    }

    pub fn subscribe_attributes(&self) -> broadcast::Receiver<AttributesEvent> {
        self.attributes.subscribe()
    }

    pub fn subscribe_cache(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    pub fn publish_attributes(&self, event: AttributesEvent) {
        if self.attributes.send(event).is_err() {
            trace!("No attribute event subscribers");
        }
    }

    pub fn publish_cache(&self, event: CacheEvent) {
        if self.cache.send(event).is_err() {
            trace!("No cache event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
