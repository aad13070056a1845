use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use exam_core::model::{Attempt, AttemptId, AttemptStatus, OptionId, Position, Question};
use exam_core::Clock;
use storage::repository::CursorStore;

use super::answers::{AnswerBook, PendingSubmission, Resolution, Selection, WriteTicket};
use super::completion::CompletionPhase;
use super::countdown::{Countdown, Tick};
use super::navigation::NavigationCursor;
use super::progress::{SessionProgress, SlotIndicator};
use crate::api::{AnswerSubmission, AttemptApi};
use crate::error::{ApiError, SessionError};

//
// ─── SHARED STATE ──────────────────────────────────────────────────────────────
//

pub(crate) struct SessionState {
    pub(crate) status: AttemptStatus,
    pub(crate) answers: AnswerBook,
    pub(crate) navigation: NavigationCursor,
    pub(crate) countdown: Countdown,
    pub(crate) completion: CompletionPhase,
    pub(crate) cursor_tx: Option<watch::Sender<Position>>,
}

pub(crate) struct SessionShared {
    pub(crate) attempt: Attempt,
    pub(crate) api: Arc<dyn AttemptApi>,
    pub(crate) cursors: Arc<dyn CursorStore>,
    pub(crate) clock: Clock,
    state: Mutex<SessionState>,
    /// Signalled whenever an answer write resolves or is abandoned.
    settled: Notify,
    cursor_writer: Mutex<Option<JoinHandle<()>>>,
}

impl SessionShared {
    /// The lock is never held across an `.await`, so a poisoned guard still
    /// holds consistent bookkeeping.
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn take_cursor_writer(&self) -> Option<JoinHandle<()>> {
        self.cursor_writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Wait until no answer write is outstanding.
    pub(crate) async fn wait_settled(&self) {
        loop {
            let notified = self.settled.notified();
            if self.state().answers.is_settled() {
                return;
            }
            notified.await;
        }
    }

    /// Stop cursor persistence and wait for the last position to be written.
    pub(crate) async fn flush_cursor(&self) {
        self.state().cursor_tx = None;
        if let Some(writer) = self.take_cursor_writer() {
            if let Err(err) = writer.await {
                warn!(attempt_id = %self.attempt.id(), error = %err, "cursor writer task failed");
            }
        }
    }

    fn submission(&self, ticket: WriteTicket) -> AnswerSubmission {
        let time_spent_seconds = self
            .state()
            .navigation
            .time_spent(ticket.position, self.clock.now());
        AnswerSubmission {
            attempt: self.attempt.id(),
            position: ticket.position,
            option: ticket.option,
            time_spent_seconds,
        }
    }
}

//
// ─── SESSION HANDLE ────────────────────────────────────────────────────────────
//

/// A live attempt. Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct AttemptSession {
    pub(crate) shared: Arc<SessionShared>,
}

/// What `select` did with the network side of an answer.
#[derive(Debug)]
#[must_use]
pub enum SelectOutcome {
    /// A write must be sent; drive the dispatch to send it.
    Dispatch(AnswerDispatch),
    /// The answer will be sent by the write already outstanding for this position.
    Queued,
    /// Identical to the outstanding write; nothing to send.
    Suppressed,
}

impl SelectOutcome {
    pub fn into_dispatch(self) -> Option<AnswerDispatch> {
        match self {
            SelectOutcome::Dispatch(dispatch) => Some(dispatch),
            SelectOutcome::Queued | SelectOutcome::Suppressed => None,
        }
    }
}

/// Final state of one position's write chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Confirmed {
        position: Position,
        option: OptionId,
    },
    /// The answer is now in the pending set.
    Failed {
        position: Position,
        option: OptionId,
        error: ApiError,
    },
    /// The write no longer owned its position when it resolved.
    Superseded { position: Position },
}

impl WriteOutcome {
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            WriteOutcome::Confirmed { position, .. }
            | WriteOutcome::Failed { position, .. }
            | WriteOutcome::Superseded { position } => *position,
        }
    }

    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, WriteOutcome::Confirmed { .. })
    }
}

/// Result of an explicit retry of every pending answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub confirmed: Vec<Position>,
    pub failed: Vec<Position>,
}

impl RetryReport {
    fn from_outcomes(outcomes: Vec<WriteOutcome>) -> Self {
        let mut report = RetryReport::default();
        for outcome in outcomes {
            match outcome {
                WriteOutcome::Confirmed { position, .. } => report.confirmed.push(position),
                WriteOutcome::Failed { position, .. } => report.failed.push(position),
                WriteOutcome::Superseded { .. } => {}
            }
        }
        report
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl AttemptSession {
    pub(crate) fn start(
        attempt: Attempt,
        cursor: Position,
        now: DateTime<Utc>,
        clock: Clock,
        api: Arc<dyn AttemptApi>,
        cursors: Arc<dyn CursorStore>,
    ) -> Self {
        let remaining = attempt.remaining_at(now);
        let (cursor_tx, cursor_rx) = watch::channel(cursor);
        let writer = spawn_cursor_writer(attempt.id(), Arc::clone(&cursors), cursor_rx);

        let state = SessionState {
            status: attempt.status(),
            answers: AnswerBook::seeded(attempt.recorded_answers()),
            navigation: NavigationCursor::new(attempt.total_questions(), cursor, now),
            countdown: Countdown::new(remaining),
            completion: CompletionPhase::Idle,
            cursor_tx: Some(cursor_tx),
        };

        Self {
            shared: Arc::new(SessionShared {
                attempt,
                api,
                cursors,
                clock,
                state: Mutex::new(state),
                settled: Notify::new(),
                cursor_writer: Mutex::new(Some(writer)),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.shared.attempt.id()
    }

    /// The attempt as it was loaded. Answers given since are in `answers()`.
    #[must_use]
    pub fn attempt(&self) -> &Attempt {
        &self.shared.attempt
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.shared.state().status
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.shared.attempt.total_questions()
    }

    #[must_use]
    pub fn question(&self, position: Position) -> Option<&Question> {
        self.shared.attempt.slot(position)?.question.as_ref()
    }

    // ─── NAVIGATION ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn cursor(&self) -> Position {
        self.shared.state().navigation.current()
    }

    /// Move the cursor to `position`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::OutOfRange` if `position` is past the last question.
    pub fn go_to(&self, position: Position) -> Result<Position, SessionError> {
        let now = self.shared.clock.now();
        let mut state = self.shared.state();
        if state.navigation.go_to(position, now)? {
            persist_cursor(&state, position);
        }
        Ok(position)
    }

    pub fn next(&self) -> Position {
        self.step(NavigationCursor::next)
    }

    pub fn previous(&self) -> Position {
        self.step(NavigationCursor::previous)
    }

    fn step(&self, move_cursor: fn(&mut NavigationCursor, DateTime<Utc>) -> bool) -> Position {
        let now = self.shared.clock.now();
        let mut state = self.shared.state();
        let moved = move_cursor(&mut state.navigation, now);
        let current = state.navigation.current();
        if moved {
            persist_cursor(&state, current);
        }
        current
    }

    // ─── ANSWERS ──────────────────────────────────────────────────────────────

    /// Record `option` for `position` and decide whether a write goes out.
    ///
    /// The local answer is updated before this returns. The returned dispatch
    /// must be driven (or dropped, which leaves the answer pending).
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the attempt no longer accepts answers, the
    /// position is out of range, or the option does not belong to the question.
    pub fn select(&self, position: Position, option: OptionId) -> Result<SelectOutcome, SessionError> {
        let mut state = self.shared.state();
        ensure_accepting(&state)?;
        state.navigation.check(position)?;
        if let Some(question) = self.question(position) {
            if !question.has_option(option) {
                return Err(SessionError::UnknownOption { position, option });
            }
        }

        let outcome = match state.answers.select(position, option) {
            Selection::Dispatch(ticket) => {
                debug!(attempt_id = %self.id(), position = %position, "answer selected");
                SelectOutcome::Dispatch(AnswerDispatch::new(Arc::clone(&self.shared), ticket))
            }
            Selection::Queued => {
                debug!(attempt_id = %self.id(), position = %position, "answer queued behind outstanding write");
                SelectOutcome::Queued
            }
            Selection::Suppressed => SelectOutcome::Suppressed,
        };
        Ok(outcome)
    }

    /// Select the option at `index` (1-based, display order) of the current question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSuchChoice` if the current question has no
    /// option at `index`, otherwise the same errors as `select`.
    pub fn select_current(&self, index: usize) -> Result<SelectOutcome, SessionError> {
        let position = self.cursor();
        let option = self
            .question(position)
            .and_then(|question| question.option_at(index))
            .map(|option| option.id)
            .ok_or(SessionError::NoSuchChoice { position, index })?;
        self.select(position, option)
    }

    /// Select and drive the resulting write to completion.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` for the same reasons as `select`. Network
    /// failures are reported in the returned `WriteOutcome`, not as errors.
    pub async fn select_and_sync(
        &self,
        position: Position,
        option: OptionId,
    ) -> Result<Option<WriteOutcome>, SessionError> {
        let dispatch = self.select(position, option)?.into_dispatch();
        match dispatch {
            Some(dispatch) => Ok(Some(dispatch.run().await)),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn answer(&self, position: Position) -> Option<OptionId> {
        self.shared.state().answers.answer(position)
    }

    #[must_use]
    pub fn answers(&self) -> BTreeMap<Position, OptionId> {
        self.shared.state().answers.answers().clone()
    }

    #[must_use]
    pub fn pending(&self) -> Vec<PendingSubmission> {
        self.shared.state().answers.pending()
    }

    /// Positions whose answers are not yet confirmed. Shown before finalize.
    #[must_use]
    pub fn unsynced_positions(&self) -> Vec<Position> {
        self.shared.state().answers.pending_positions()
    }

    /// Re-send every pending answer concurrently and wait for all of them.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the attempt no longer accepts answers.
    pub async fn retry_pending(&self) -> Result<RetryReport, SessionError> {
        let dispatches = {
            let mut state = self.shared.state();
            ensure_accepting(&state)?;
            state
                .answers
                .begin_retry()
                .into_iter()
                .map(|ticket| AnswerDispatch::new(Arc::clone(&self.shared), ticket))
                .collect::<Vec<_>>()
        };
        if dispatches.is_empty() {
            return Ok(RetryReport::default());
        }

        debug!(attempt_id = %self.id(), count = dispatches.len(), "retrying pending answers");
        let outcomes = join_all(dispatches.into_iter().map(AnswerDispatch::run)).await;
        Ok(RetryReport::from_outcomes(outcomes))
    }

    // ─── PROGRESS & CLOCK ─────────────────────────────────────────────────────

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let state = self.shared.state();
        SessionProgress {
            status: state.status,
            current: state.navigation.current(),
            total: state.navigation.total(),
            answered: state.answers.answered_count(),
            pending: state.answers.pending_count(),
            in_flight: state.answers.in_flight_count(),
            remaining_seconds: state.countdown.remaining(),
            is_completing: state.completion.is_running(),
            indicators: indicators(&state),
        }
    }

    /// Grid state for each position, in order.
    #[must_use]
    pub fn slot_indicators(&self) -> Vec<SlotIndicator> {
        indicators(&self.shared.state())
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u64 {
        self.shared.state().countdown.remaining()
    }

    /// Advance the display countdown by one second.
    pub fn tick(&self) -> Tick {
        self.shared.state().countdown.tick()
    }

    /// True once if the countdown was already at zero when seeded.
    pub fn expire_if_elapsed(&self) -> bool {
        self.shared.state().countdown.expire_if_elapsed()
    }

    /// Re-anchor the countdown to the server start timestamp.
    pub fn resync_clock(&self) -> u64 {
        let remaining = self.shared.attempt.remaining_at(self.shared.clock.now());
        let mut state = self.shared.state();
        state.countdown.resync(remaining);
        state.countdown.remaining()
    }

    /// Tear the session down without completing it.
    ///
    /// The last cursor position is flushed and stays persisted so the attempt
    /// resumes where it was left.
    pub async fn close(&self) {
        self.shared.state().countdown.stop();
        self.shared.flush_cursor().await;
        debug!(attempt_id = %self.id(), "session closed");
    }
}

impl fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state();
        f.debug_struct("AttemptSession")
            .field("attempt", &self.shared.attempt.id())
            .field("status", &state.status)
            .field("cursor", &state.navigation.current())
            .field("pending", &state.answers.pending_count())
            .finish_non_exhaustive()
    }
}

fn ensure_accepting(state: &SessionState) -> Result<(), SessionError> {
    if !state.status.is_in_progress() {
        return Err(SessionError::NotInProgress(state.status));
    }
    if state.completion.is_running() {
        return Err(SessionError::Completing);
    }
    Ok(())
}

fn persist_cursor(state: &SessionState, position: Position) {
    if let Some(tx) = &state.cursor_tx {
        tx.send_replace(position);
    }
}

fn indicators(state: &SessionState) -> Vec<SlotIndicator> {
    let current = state.navigation.current();
    (1..=state.navigation.total())
        .filter_map(Position::new)
        .map(|position| {
            if position == current {
                SlotIndicator::Current
            } else if state.answers.answer(position).is_some() {
                SlotIndicator::Answered
            } else {
                SlotIndicator::Unanswered
            }
        })
        .collect()
}

fn spawn_cursor_writer(
    attempt: AttemptId,
    cursors: Arc<dyn CursorStore>,
    mut rx: watch::Receiver<Position>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let position = *rx.borrow_and_update();
            if let Err(err) = cursors.save_cursor(attempt, position).await {
                warn!(attempt_id = %attempt, position = %position, error = %err, "failed to persist cursor");
            }
        }
    })
}

//
// ─── DISPATCH ──────────────────────────────────────────────────────────────────
//

/// Owns the outstanding write for one position until it resolves.
///
/// Dropping it before `run` finishes moves the newest answer for the position
/// into the pending set.
#[must_use = "an undriven dispatch leaves its answer pending"]
pub struct AnswerDispatch {
    shared: Arc<SessionShared>,
    ticket: WriteTicket,
    armed: bool,
}

impl AnswerDispatch {
    pub(crate) fn new(shared: Arc<SessionShared>, ticket: WriteTicket) -> Self {
        Self {
            shared,
            ticket,
            armed: true,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.ticket.position
    }

    /// Send the answer, then any newer answer selected for the same position
    /// while the previous write was outstanding.
    pub async fn run(mut self) -> WriteOutcome {
        let attempt = self.shared.attempt.id();

        loop {
            let ticket = self.ticket;
            let submission = self.shared.submission(ticket);
            debug!(
                attempt_id = %attempt,
                position = %ticket.position,
                time_spent = submission.time_spent_seconds,
                "submitting answer"
            );
            let result = self.shared.api.submit_answer(&submission).await;
            let resolution = self
                .shared
                .state()
                .answers
                .resolve(ticket, result.is_ok());

            let outcome = match (resolution, result) {
                (Resolution::Next(next), result) => {
                    if let Err(err) = result {
                        warn!(attempt_id = %attempt, position = %ticket.position, error = %err, "superseded answer write failed");
                    }
                    self.ticket = next;
                    continue;
                }
                (Resolution::Confirmed, _) => WriteOutcome::Confirmed {
                    position: ticket.position,
                    option: ticket.option,
                },
                (Resolution::Failed, Err(error)) => {
                    warn!(attempt_id = %attempt, position = %ticket.position, error = %error, "answer write failed, kept as pending");
                    WriteOutcome::Failed {
                        position: ticket.position,
                        option: ticket.option,
                        error,
                    }
                }
                (Resolution::Failed, Ok(())) | (Resolution::Stale, _) => WriteOutcome::Superseded {
                    position: ticket.position,
                },
            };

            self.armed = false;
            self.shared.settled.notify_waiters();
            return outcome;
        }
    }
}

impl Drop for AnswerDispatch {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        self.shared.state().answers.abandon(self.ticket);
        self.shared.settled.notify_waiters();
        debug!(attempt_id = %self.shared.attempt.id(), position = %self.ticket.position, "answer write dropped, kept as pending");
    }
}

impl fmt::Debug for AnswerDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerDispatch")
            .field("attempt", &self.shared.attempt.id())
            .field("ticket", &self.ticket)
            .field("armed", &self.armed)
            .finish()
    }
}
