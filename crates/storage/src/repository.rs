use async_trait::async_trait;
use exam_core::model::{AttemptId, Position};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Ephemeral client storage for the navigation cursor of an attempt.
///
/// Entries are keyed by attempt id so attempts opened side by side never share
/// a cursor. Nothing else about an attempt is kept here: answers and timing are
/// always re-derived from the server.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Fetch the last persisted cursor for an attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_cursor(&self, attempt: AttemptId) -> Result<Option<Position>, StorageError>;

    /// Persist the cursor for an attempt, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn save_cursor(&self, attempt: AttemptId, position: Position) -> Result<(), StorageError>;

    /// Remove the cursor entry for an attempt. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn clear_cursor(&self, attempt: AttemptId) -> Result<(), StorageError>;
}

/// Simple in-memory cursor store for tests and throwaway sessions.
#[derive(Clone, Default)]
pub struct InMemoryCursorStore {
    cursors: Arc<Mutex<HashMap<AttemptId, Position>>>,
}

impl InMemoryCursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for InMemoryCursorStore {
    async fn load_cursor(&self, attempt: AttemptId) -> Result<Option<Position>, StorageError> {
        let guard = self
            .cursors
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&attempt).copied())
    }

    async fn save_cursor(&self, attempt: AttemptId, position: Position) -> Result<(), StorageError> {
        let mut guard = self
            .cursors
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(attempt, position);
        Ok(())
    }

    async fn clear_cursor(&self, attempt: AttemptId) -> Result<(), StorageError> {
        let mut guard = self
            .cursors
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&attempt);
        Ok(())
    }
}

/// Storage handles behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub cursors: Arc<dyn CursorStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            cursors: Arc::new(InMemoryCursorStore::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn attempt() -> AttemptId {
        AttemptId::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn cursor_round_trips_and_clears() {
        let store = InMemoryCursorStore::new();
        let id = attempt();
        assert_eq!(store.load_cursor(id).await.unwrap(), None);

        store.save_cursor(id, Position::new(4).unwrap()).await.unwrap();
        store.save_cursor(id, Position::new(6).unwrap()).await.unwrap();
        assert_eq!(store.load_cursor(id).await.unwrap(), Position::new(6));

        store.clear_cursor(id).await.unwrap();
        assert_eq!(store.load_cursor(id).await.unwrap(), None);
        store.clear_cursor(id).await.unwrap();
    }

    #[tokio::test]
    async fn cursors_are_scoped_per_attempt() {
        let storage = Storage::in_memory();
        let first = attempt();
        let second = attempt();

        storage
            .cursors
            .save_cursor(first, Position::new(2).unwrap())
            .await
            .unwrap();
        storage
            .cursors
            .save_cursor(second, Position::new(9).unwrap())
            .await
            .unwrap();
        storage.cursors.clear_cursor(first).await.unwrap();

        assert_eq!(storage.cursors.load_cursor(first).await.unwrap(), None);
        assert_eq!(
            storage.cursors.load_cursor(second).await.unwrap(),
            Position::new(9)
        );
    }
}
