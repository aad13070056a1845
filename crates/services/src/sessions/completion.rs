use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use exam_core::model::AttemptStatus;

use super::service::{AnswerDispatch, AttemptSession, SessionShared};
use crate::api::AttemptResult;
use crate::error::CompletionError;

type CompletionFuture = Shared<BoxFuture<'static, Result<AttemptResult, CompletionError>>>;

pub(crate) enum CompletionPhase {
    Idle,
    Running(CompletionFuture),
    Done(AttemptResult),
}

impl CompletionPhase {
    pub(crate) fn is_running(&self) -> bool {
        matches!(self, CompletionPhase::Running(_))
    }
}

impl AttemptSession {
    /// Submit the attempt.
    ///
    /// Outstanding writes settle first, then every pending answer is re-sent
    /// concurrently. The attempt is finalized only if none of them failed.
    /// Concurrent calls share one run; once the attempt is completed the
    /// stored result is returned without contacting the server again.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Unsynced` listing the positions whose answers
    /// still failed, or `CompletionError::Finalize` if the server rejected the
    /// finalize call, or `CompletionError::Interrupted` if the run itself died.
    /// In each case the attempt stays in progress and `complete` may be called
    /// again.
    ///
    /// The run is a spawned task: dropping the returned future does not
    /// cancel it, and a later call joins the same run.
    pub async fn complete(&self) -> Result<AttemptResult, CompletionError> {
        self.completion_future().await
    }

    /// True while a completion run is in progress.
    #[must_use]
    pub fn is_completing(&self) -> bool {
        self.shared.state().completion.is_running()
    }

    /// The finalize result, once the attempt is completed.
    #[must_use]
    pub fn result(&self) -> Option<AttemptResult> {
        match &self.shared.state().completion {
            CompletionPhase::Done(result) => Some(result.clone()),
            CompletionPhase::Idle | CompletionPhase::Running(_) => None,
        }
    }

    fn completion_future(&self) -> CompletionFuture {
        let mut state = self.shared.state();
        match &state.completion {
            CompletionPhase::Running(run) => return run.clone(),
            CompletionPhase::Done(result) => {
                let result = result.clone();
                return async move { Ok(result) }.boxed().shared();
            }
            CompletionPhase::Idle => {}
        }

        // Still holding the lock: the task's terminal update lands after `Running`.
        let handle = tokio::spawn(run_completion(Arc::clone(&self.shared)));
        let session = Arc::downgrade(&self.shared);
        let run = async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    if let Some(shared) = session.upgrade() {
                        shared.state().completion = CompletionPhase::Idle;
                    }
                    Err(CompletionError::Interrupted(err.to_string()))
                }
            }
        }
        .boxed()
        .shared();
        state.completion = CompletionPhase::Running(run.clone());
        run
    }
}

async fn run_completion(shared: Arc<SessionShared>) -> Result<AttemptResult, CompletionError> {
    let attempt = shared.attempt.id();
    info!(attempt_id = %attempt, "completing attempt");

    shared.wait_settled().await;

    let dispatches = {
        let tickets = shared.state().answers.begin_retry();
        tickets
            .into_iter()
            .map(|ticket| AnswerDispatch::new(Arc::clone(&shared), ticket))
            .collect::<Vec<_>>()
    };
    if !dispatches.is_empty() {
        debug!(attempt_id = %attempt, count = dispatches.len(), "re-sending pending answers");
        join_all(dispatches.into_iter().map(AnswerDispatch::run)).await;
    }
    shared.wait_settled().await;

    let unsynced = shared.state().answers.pending_positions();
    if !unsynced.is_empty() {
        warn!(attempt_id = %attempt, count = unsynced.len(), "answers still unsynced, not finalizing");
        shared.state().completion = CompletionPhase::Idle;
        return Err(CompletionError::Unsynced {
            positions: unsynced,
        });
    }

    let result = match shared.api.finalize_attempt(attempt).await {
        Ok(result) => result,
        Err(err) => {
            warn!(attempt_id = %attempt, error = %err, "finalize failed");
            shared.state().completion = CompletionPhase::Idle;
            return Err(CompletionError::Finalize(err));
        }
    };

    {
        let mut state = shared.state();
        state.status = AttemptStatus::Completed;
        state.countdown.stop();
        state.completion = CompletionPhase::Done(result.clone());
    }
    info!(
        attempt_id = %attempt,
        score = result.score,
        passed = result.passed,
        "attempt completed"
    );

    shared.flush_cursor().await;
    if let Err(err) = shared.cursors.clear_cursor(attempt).await {
        warn!(attempt_id = %attempt, error = %err, "failed to clear cursor");
    }

    Ok(result)
}
