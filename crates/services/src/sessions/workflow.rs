use std::sync::Arc;

use tracing::{info, warn};

use exam_core::model::{Attempt, AttemptId, Position};
use exam_core::Clock;
use storage::repository::CursorStore;

use super::service::AttemptSession;
use crate::api::AttemptApi;
use crate::error::LoadError;

/// Opens attempts against the remote service and the local cursor store.
#[derive(Clone)]
pub struct SessionLoader {
    clock: Clock,
    api: Arc<dyn AttemptApi>,
    cursors: Arc<dyn CursorStore>,
}

impl SessionLoader {
    #[must_use]
    pub fn new(clock: Clock, api: Arc<dyn AttemptApi>, cursors: Arc<dyn CursorStore>) -> Self {
        Self { clock, api, cursors }
    }

    /// Fetch an in-progress attempt and start a session for it.
    ///
    /// Answers come only from the server; the stored cursor is restored when it
    /// is still in range, otherwise the session opens at the first question.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Api` if the fetch fails and
    /// `LoadError::NotInProgress` if the attempt is already closed.
    pub async fn load(&self, attempt_id: AttemptId) -> Result<AttemptSession, LoadError> {
        let attempt = self.api.fetch_attempt(attempt_id).await.map_err(|err| {
            warn!(attempt_id = %attempt_id, error = %err, "failed to load attempt");
            LoadError::Api(err)
        })?;

        let status = attempt.status();
        if !status.is_in_progress() {
            if let Err(err) = self.cursors.clear_cursor(attempt_id).await {
                warn!(attempt_id = %attempt_id, error = %err, "failed to clear cursor");
            }
            return Err(LoadError::NotInProgress {
                attempt: attempt_id,
                status,
            });
        }

        let cursor = self.restore_cursor(&attempt).await;
        let now = self.clock.now();
        let session = AttemptSession::start(
            attempt,
            cursor,
            now,
            self.clock,
            Arc::clone(&self.api),
            Arc::clone(&self.cursors),
        );

        info!(
            attempt_id = %attempt_id,
            questions = session.total_questions(),
            remaining = session.remaining_seconds(),
            cursor = %cursor,
            "attempt loaded"
        );
        Ok(session)
    }

    /// Fetch a finished attempt for read-only review.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Api` if the fetch fails.
    pub async fn load_review(&self, attempt_id: AttemptId) -> Result<Attempt, LoadError> {
        Ok(self.api.fetch_attempt_for_review(attempt_id).await?)
    }

    async fn restore_cursor(&self, attempt: &Attempt) -> Position {
        match self.cursors.load_cursor(attempt.id()).await {
            Ok(Some(position)) if position.within(attempt.total_questions()) => position,
            Ok(_) => Position::FIRST,
            Err(err) => {
                warn!(attempt_id = %attempt.id(), error = %err, "failed to read stored cursor");
                Position::FIRST
            }
        }
    }
}
