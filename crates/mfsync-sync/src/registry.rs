//! Capability-based dispatch to content synchronizers

use std::sync::Arc;

use mfsync_core::domain::NodeId;

use crate::synchronizer::IContentSynchronizer;

/// Ordered set of synchronizers; the first accepting one handles a file
#[derive(Default, Clone)]
pub struct SynchronizerRegistry {
    synchronizers: Vec<Arc<dyn IContentSynchronizer>>,
}

impl SynchronizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, synchronizer: Arc<dyn IContentSynchronizer>) {
        self.synchronizers.push(synchronizer);
    }

    pub fn with(mut self, synchronizer: Arc<dyn IContentSynchronizer>) -> Self {
        self.register(synchronizer);
        self
    }

    /// Returns the first synchronizer accepting `handle`
    pub fn resolve(&self, handle: NodeId) -> Option<Arc<dyn IContentSynchronizer>> {
        self.synchronizers
            .iter()
            .find(|s| s.accepts(handle))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.synchronizers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.synchronizers.is_empty()
    }
}
