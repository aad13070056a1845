#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use uuid::Uuid;

use exam_core::model::{
    AnswerOption, Attempt, AttemptId, AttemptStatus, Difficulty, OptionId, Position, Question,
    QuestionId, QuestionSlot, TestType,
};
use exam_core::time::{fixed_clock, fixed_now};
use services::{AnswerSubmission, ApiError, AttemptApi, AttemptResult, Clock, SessionLoader};
use storage::repository::{CursorStore, InMemoryCursorStore, StorageError};

pub const OPTIONS_PER_QUESTION: u32 = 4;

pub fn pos(value: u32) -> Position {
    Position::new(value).unwrap()
}

pub fn attempt_id() -> AttemptId {
    AttemptId::new(Uuid::from_u128(0x0b6f_4c3e_3f1d_4d59_8d0e_2d1f_0f9a_1c11))
}

/// Deterministic option id: `choice` is 1-based in display order.
pub fn option(position: u32, choice: u32) -> OptionId {
    OptionId::new(Uuid::from_u128(
        (u128::from(position) << 16) | u128::from(choice),
    ))
}

fn question(position: u32) -> Question {
    let options = (1..=OPTIONS_PER_QUESTION)
        .map(|choice| AnswerOption {
            id: option(position, choice),
            text: format!("choice {choice}"),
            order: choice,
        })
        .collect();
    Question::new(
        QuestionId::new(Uuid::from_u128(0xAAAA_0000 + u128::from(position))),
        format!("Question {position}"),
        options,
        Difficulty::Medium,
        Some("Structures".into()),
    )
}

/// Scriptable stand-in for the remote attempt service.
pub struct ScriptedApi {
    id: AttemptId,
    status: Mutex<AttemptStatus>,
    started_at: DateTime<Utc>,
    time_limit: Duration,
    total: u32,
    recorded: Mutex<BTreeMap<Position, OptionId>>,
    submissions: Mutex<Vec<AnswerSubmission>>,
    failing_options: Mutex<HashSet<OptionId>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    fetch_fails: AtomicBool,
    finalize_fails: AtomicBool,
    finalize_calls: AtomicUsize,
    finalized_answers: Mutex<Option<BTreeMap<Position, OptionId>>>,
}

impl ScriptedApi {
    /// An in-progress attempt with `total` questions started `elapsed` before
    /// the fixed test clock.
    pub fn new(total: u32, time_limit: Duration, elapsed: Duration) -> Self {
        Self {
            id: attempt_id(),
            status: Mutex::new(AttemptStatus::InProgress),
            started_at: fixed_now() - elapsed,
            time_limit,
            total,
            recorded: Mutex::new(BTreeMap::new()),
            submissions: Mutex::new(Vec::new()),
            failing_options: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            gate: Mutex::new(None),
            fetch_fails: AtomicBool::new(false),
            finalize_fails: AtomicBool::new(false),
            finalize_calls: AtomicUsize::new(0),
            finalized_answers: Mutex::new(None),
        }
    }

    pub fn with_status(self, status: AttemptStatus) -> Self {
        *self.status.lock().unwrap() = status;
        self
    }

    pub fn with_recorded(self, position: Position, option: OptionId) -> Self {
        self.recorded.lock().unwrap().insert(position, option);
        self
    }

    pub fn fail_option(&self, option: OptionId) {
        self.failing_options.lock().unwrap().insert(option);
    }

    pub fn heal_option(&self, option: OptionId) {
        self.failing_options.lock().unwrap().remove(&option);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_fetch_fails(&self, fails: bool) {
        self.fetch_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_finalize_fails(&self, fails: bool) {
        self.finalize_fails.store(fails, Ordering::SeqCst);
    }

    /// Hold every answer write until a permit is released on the returned gate.
    pub fn gate_submissions(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Stop holding new writes. Writes already waiting on the gate keep waiting.
    pub fn ungate_submissions(&self) {
        *self.gate.lock().unwrap() = None;
    }

    pub fn submissions(&self) -> Vec<AnswerSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submitted_options(&self, position: Position) -> Vec<OptionId> {
        self.submissions()
            .into_iter()
            .filter(|s| s.position == position)
            .map(|s| s.option)
            .collect()
    }

    pub fn recorded(&self) -> BTreeMap<Position, OptionId> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn finalize_calls(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    /// Server-side answers at the moment finalize succeeded.
    pub fn finalized_answers(&self) -> Option<BTreeMap<Position, OptionId>> {
        self.finalized_answers.lock().unwrap().clone()
    }

    fn build(&self) -> Result<Attempt, ApiError> {
        let recorded = self.recorded.lock().unwrap().clone();
        let slots = (1..=self.total)
            .map(|p| {
                let slot = QuestionSlot::new(pos(p), question(p).id()).with_question(question(p));
                match recorded.get(&pos(p)) {
                    Some(answer) => slot.with_answer(*answer),
                    None => slot,
                }
            })
            .collect();
        Attempt::from_parts(
            self.id,
            TestType::FullExam,
            *self.status.lock().unwrap(),
            self.started_at,
            self.time_limit,
            slots,
        )
        .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl AttemptApi for ScriptedApi {
    async fn fetch_attempt(&self, _attempt: AttemptId) -> Result<Attempt, ApiError> {
        if self.fetch_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        self.build()
    }

    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<(), ApiError> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        self.submissions.lock().unwrap().push(*submission);

        let failing = self.failing_options.lock().unwrap().contains(&submission.option);
        if failing || self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection reset".into()));
        }
        self.recorded
            .lock()
            .unwrap()
            .insert(submission.position, submission.option);
        Ok(())
    }

    async fn finalize_attempt(&self, attempt: AttemptId) -> Result<AttemptResult, ApiError> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.finalize_fails.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 500,
                message: "finalize failed".into(),
            });
        }

        let recorded = self.recorded();
        *self.finalized_answers.lock().unwrap() = Some(recorded.clone());
        *self.status.lock().unwrap() = AttemptStatus::Completed;
        let correct = u32::try_from(recorded.len()).unwrap();
        Ok(AttemptResult {
            attempt_id: attempt,
            score: f64::from(correct) / f64::from(self.total) * 100.0,
            correct_answers: correct,
            total_questions: self.total,
            time_spent_seconds: 0,
            passed: correct * 10 >= self.total * 7,
            pass_probability: 0.5,
            weak_topics: Vec::new(),
            completed_at: fixed_now(),
        })
    }

    async fn fetch_attempt_for_review(&self, _attempt: AttemptId) -> Result<Attempt, ApiError> {
        self.build()
    }
}

pub struct Harness {
    pub api: Arc<ScriptedApi>,
    pub cursors: InMemoryCursorStore,
    pub loader: SessionLoader,
}

pub fn harness(api: ScriptedApi) -> Harness {
    harness_at(api, fixed_clock())
}

pub fn harness_at(api: ScriptedApi, clock: Clock) -> Harness {
    let api = Arc::new(api);
    let cursors = InMemoryCursorStore::new();
    let loader = SessionLoader::new(clock, api.clone(), Arc::new(cursors.clone()));
    Harness {
        api,
        cursors,
        loader,
    }
}

/// Cursor store whose backend is always unreachable.
#[derive(Default)]
pub struct UnavailableCursorStore {
    saves: AtomicUsize,
}

impl UnavailableCursorStore {
    pub fn save_attempts(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CursorStore for UnavailableCursorStore {
    async fn load_cursor(&self, _attempt: AttemptId) -> Result<Option<Position>, StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn save_cursor(&self, _attempt: AttemptId, _position: Position) -> Result<(), StorageError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Connection("database is locked".into()))
    }

    async fn clear_cursor(&self, _attempt: AttemptId) -> Result<(), StorageError> {
        Err(StorageError::Connection("database is locked".into()))
    }
}

pub fn loader_with_cursors(
    api: ScriptedApi,
    cursors: Arc<dyn CursorStore>,
) -> (Arc<ScriptedApi>, SessionLoader) {
    let api = Arc::new(api);
    let loader = SessionLoader::new(fixed_clock(), api.clone(), cursors);
    (api, loader)
}
