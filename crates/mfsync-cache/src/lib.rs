//! MFSync Cache - Content sync record storage
//!
//! Stores the last successfully synchronized content of each file:
//! - [`MemoryContentStorage`] - session-scoped default
//! - [`SqliteContentStorage`] - persistent store over SQLite
//!
//! ## Architecture
//!
//! This crate implements the `IContentStorage` port from `mfsync-core`.
//! It is a driven (secondary) adapter in the hexagonal architecture.
//!
//! ## Usage
//!
//! ```no_run
//! use mfsync_cache::open_storage;
//! use mfsync_core::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let storage = open_storage(&config.storage).await?;
//! let record = storage.create_record().await?;
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod pool;
pub mod sqlite;

use std::sync::Arc;

use mfsync_core::config::{StorageBackend, StorageConfig};
use mfsync_core::domain::RecordId;
use mfsync_core::ports::IContentStorage;

pub use memory::MemoryContentStorage;
pub use pool::DatabasePool;
pub use sqlite::SqliteContentStorage;

/// Errors that can occur during content storage operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The record id is unknown to the storage
    #[error("Content record not found: {0}")]
    RecordNotFound(RecordId),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

/// Opens the content storage selected by configuration
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn IContentStorage>, CacheError> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryContentStorage::new())),
        StorageBackend::Sqlite => {
            let pool = DatabasePool::new(&config.database_path).await?;
            Ok(Arc::new(SqliteContentStorage::new(pool.pool().clone())))
        }
    }
}
