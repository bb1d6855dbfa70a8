//! Content storage port (driven/secondary port)
//!
//! Holds the last successfully synchronized content of every file, one
//! opaque byte record per file. The synchronizer is the only writer; a
//! record is read as the baseline of the next three-way comparison.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (in-memory, SQLite).
//! - Record ids are allocated by the storage and never reused.

use crate::domain::newtypes::RecordId;

/// Port trait for last-synced content records
#[async_trait::async_trait]
pub trait IContentStorage: Send + Sync {
    /// Allocates a new empty record
    async fn create_record(&self) -> anyhow::Result<RecordId>;

    /// Reads the full content of a record
    ///
    /// Fails if the record does not exist.
    async fn read(&self, id: RecordId) -> anyhow::Result<Vec<u8>>;

    /// Replaces the full content of a record
    ///
    /// Fails if the record does not exist.
    async fn write(&self, id: RecordId, bytes: &[u8]) -> anyhow::Result<()>;

    /// Drops a record; unknown ids are ignored
    async fn remove(&self, id: RecordId) -> anyhow::Result<()>;
}
