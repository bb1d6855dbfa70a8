//! SQLite-backed content storage.
//!
//! Records outlive the process, which lets an embedding application keep
//! sync baselines across restarts when it also persists the record ids.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use mfsync_core::domain::RecordId;
use mfsync_core::ports::IContentStorage;

use crate::CacheError;

/// `IContentStorage` over the `content_records` table
pub struct SqliteContentStorage {
    pool: SqlitePool,
}

impl SqliteContentStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Number of stored records
    pub async fn count(&self) -> Result<i64, CacheError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl IContentStorage for SqliteContentStorage {
    async fn create_record(&self) -> anyhow::Result<RecordId> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("INSERT INTO content_records (payload, updated_at) VALUES (x'', ?)")
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        let id = RecordId::new(result.last_insert_rowid());
        tracing::trace!(record = %id, "Content record created");
        Ok(id)
    }

    async fn read(&self, id: RecordId) -> anyhow::Result<Vec<u8>> {
        let row = sqlx::query("SELECT payload FROM content_records WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?
            .ok_or(CacheError::RecordNotFound(id))?;

        let payload: Vec<u8> = row.try_get("payload").map_err(CacheError::from)?;
        Ok(payload)
    }

    async fn write(&self, id: RecordId, bytes: &[u8]) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("UPDATE content_records SET payload = ?, updated_at = ? WHERE id = ?")
            .bind(bytes)
            .bind(&now)
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;

        if result.rows_affected() == 0 {
            return Err(CacheError::RecordNotFound(id).into());
        }
        tracing::trace!(record = %id, bytes = bytes.len(), "Content record written");
        Ok(())
    }

    async fn remove(&self, id: RecordId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM content_records WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }
}
