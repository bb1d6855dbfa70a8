//! Session-scoped in-memory content storage.

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use mfsync_core::domain::RecordId;
use mfsync_core::ports::IContentStorage;

use crate::CacheError;

/// Content records kept in a concurrent map for the lifetime of the process
pub struct MemoryContentStorage {
    records: DashMap<RecordId, Vec<u8>>,
    next_id: AtomicI64,
}

impl MemoryContentStorage {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryContentStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IContentStorage for MemoryContentStorage {
    async fn create_record(&self) -> anyhow::Result<RecordId> {
        let id = RecordId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.records.insert(id, Vec::new());
        tracing::trace!(record = %id, "Content record created");
        Ok(id)
    }

    async fn read(&self, id: RecordId) -> anyhow::Result<Vec<u8>> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CacheError::RecordNotFound(id).into())
    }

    async fn write(&self, id: RecordId, bytes: &[u8]) -> anyhow::Result<()> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(CacheError::RecordNotFound(id))?;
        *record = bytes.to_vec();
        Ok(())
    }

    async fn remove(&self, id: RecordId) -> anyhow::Result<()> {
        self.records.remove(&id);
        Ok(())
    }
}
