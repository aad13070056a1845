use async_trait::async_trait;
use chrono::Utc;
use exam_core::model::{AttemptId, Position};
use sqlx::Row;

use super::SqliteCursorStore;
use super::mapping::{attempt_key, position_from_i64, position_to_i64};
use crate::repository::{CursorStore, StorageError};

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn load_cursor(&self, attempt: AttemptId) -> Result<Option<Position>, StorageError> {
        let row = sqlx::query("SELECT position FROM attempt_cursors WHERE attempt_id = ?1")
            .bind(attempt_key(attempt))
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let position: i64 = row
            .try_get("position")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        position_from_i64(position).map(Some)
    }

    async fn save_cursor(&self, attempt: AttemptId, position: Position) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO attempt_cursors (attempt_id, position, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(attempt_id) DO UPDATE SET
                position = excluded.position,
                updated_at = excluded.updated_at
            ",
        )
        .bind(attempt_key(attempt))
        .bind(position_to_i64(position))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }

    async fn clear_cursor(&self, attempt: AttemptId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM attempt_cursors WHERE attempt_id = ?1")
            .bind(attempt_key(attempt))
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
