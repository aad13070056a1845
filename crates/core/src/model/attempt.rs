use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AttemptId, OptionId, Position, QuestionId};
use crate::model::question::Question;
use crate::time::remaining_seconds;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("attempt has no question slots")]
    NoSlots,

    #[error("duplicate slot position {0}")]
    DuplicatePosition(Position),

    #[error("slot positions must be contiguous from 1; expected {expected}, found {found}")]
    PositionGap { expected: u32, found: Position },

    #[error("too many question slots: {0}")]
    TooManySlots(usize),

    #[error("time limit must be positive")]
    InvalidTimeLimit,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    #[must_use]
    pub fn is_in_progress(self) -> bool {
        matches!(self, AttemptStatus::InProgress)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    FullExam,
    TopicSpecific,
    #[default]
    Custom,
}

impl TestType {
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            TestType::FullExam => "Full Mock Exam",
            TestType::TopicSpecific => "Topic Practice",
            TestType::Custom => "Practice Test",
        }
    }
}

//
// ─── SLOT ──────────────────────────────────────────────────────────────────────
//

/// One position of an attempt as recorded by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSlot {
    pub position: Position,
    pub question_id: QuestionId,
    pub question: Option<Question>,
    pub answer: Option<OptionId>,
    pub is_correct: Option<bool>,
    pub time_spent_seconds: u32,
}

impl QuestionSlot {
    #[must_use]
    pub fn new(position: Position, question_id: QuestionId) -> Self {
        Self {
            position,
            question_id,
            question: None,
            answer: None,
            is_correct: None,
            time_spent_seconds: 0,
        }
    }

    #[must_use]
    pub fn with_question(mut self, question: Question) -> Self {
        self.question = Some(question);
        self
    }

    #[must_use]
    pub fn with_answer(mut self, answer: OptionId) -> Self {
        self.answer = Some(answer);
        self
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// A single timed exam instance as fetched from the server.
///
/// Slots are stored ordered by position and always cover `1..=N` without gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    id: AttemptId,
    test_type: TestType,
    status: AttemptStatus,
    started_at: DateTime<Utc>,
    time_limit: Duration,
    slots: Vec<QuestionSlot>,
}

impl Attempt {
    /// Assemble an attempt from server data, validating the slot layout.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when there are no slots, positions repeat or skip,
    /// or the time limit is not positive.
    pub fn from_parts(
        id: AttemptId,
        test_type: TestType,
        status: AttemptStatus,
        started_at: DateTime<Utc>,
        time_limit: Duration,
        mut slots: Vec<QuestionSlot>,
    ) -> Result<Self, AttemptError> {
        if time_limit <= Duration::zero() {
            return Err(AttemptError::InvalidTimeLimit);
        }
        if slots.is_empty() {
            return Err(AttemptError::NoSlots);
        }
        if u32::try_from(slots.len()).is_err() {
            return Err(AttemptError::TooManySlots(slots.len()));
        }

        slots.sort_by_key(|slot| slot.position);
        let mut expected = 1_u32;
        for slot in &slots {
            let found = slot.position;
            if found.value() < expected {
                return Err(AttemptError::DuplicatePosition(found));
            }
            if found.value() > expected {
                return Err(AttemptError::PositionGap { expected, found });
            }
            expected += 1;
        }

        Ok(Self {
            id,
            test_type,
            status,
            started_at,
            time_limit,
            slots,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    #[must_use]
    pub fn slots(&self) -> &[QuestionSlot] {
        &self.slots
    }

    /// Number of slots (`N`).
    #[must_use]
    pub fn total_questions(&self) -> u32 {
        // Length is checked to fit in `from_parts`.
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn slot(&self, position: Position) -> Option<&QuestionSlot> {
        let index = usize::try_from(position.value()).ok()?.checked_sub(1)?;
        self.slots.get(index)
    }

    /// Answers already accepted by the server, by position.
    pub fn recorded_answers(&self) -> impl Iterator<Item = (Position, OptionId)> + '_ {
        self.slots
            .iter()
            .filter_map(|slot| slot.answer.map(|answer| (slot.position, answer)))
    }

    /// Seconds left at `now`, derived from the server start timestamp.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> u64 {
        remaining_seconds(self.started_at, self.time_limit, now)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
