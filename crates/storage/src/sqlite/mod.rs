//! `SQLite` backend for the navigation cursor.
//!
//! One row per attempt in `attempt_cursors`. The session writes through a
//! single background task, so the pool stays small and only needs to ride out
//! a second process holding the file.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{CursorStore, Storage};

mod cursor_repo;
mod mapping;
mod migrate;

#[derive(Clone)]
pub struct SqliteCursorStore {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteCursorStore {
    /// Open the cursor database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the file cannot be opened or if switching
    /// it to WAL mode fails.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    // Another client on the same file waits instead of failing the save.
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the cursor schema up to date.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration step fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Cursor storage in the `SQLite` file at `database_url`, migrated and ready.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let store = SqliteCursorStore::connect(database_url).await?;
        store.migrate().await?;
        let cursors: Arc<dyn CursorStore> = Arc::new(store);
        Ok(Self { cursors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteCursorStore>();
    }
}
