//! Seam to the remote attempt service.

mod http;
mod wire;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use exam_core::model::{Attempt, AttemptId, OptionId, Position};

pub use crate::error::ApiError;
pub use http::{ApiConfig, HttpAttemptApi};

/// One answer write as sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub attempt: AttemptId,
    pub position: Position,
    pub option: OptionId,
    pub time_spent_seconds: u32,
}

/// Result of finalizing an attempt. The session engine only passes it through.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttemptResult {
    #[serde(rename = "test_id")]
    pub attempt_id: AttemptId,
    pub score: f64,
    pub correct_answers: u32,
    pub total_questions: u32,
    #[serde(default)]
    pub time_spent_seconds: u32,
    #[serde(rename = "pass_status")]
    pub passed: bool,
    #[serde(default)]
    pub pass_probability: f64,
    #[serde(default)]
    pub weak_topics: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Operations the session engine consumes from the attempt service.
#[async_trait]
pub trait AttemptApi: Send + Sync {
    /// Fetch an attempt with all slots and any answers already recorded.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is malformed.
    async fn fetch_attempt(&self, attempt: AttemptId) -> Result<Attempt, ApiError>;

    /// Record one answer. Re-sending the same answer for a position is harmless.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the write was not acknowledged.
    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<(), ApiError>;

    /// Close the attempt and compute its result.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the attempt could not be finalized.
    async fn finalize_attempt(&self, attempt: AttemptId) -> Result<AttemptResult, ApiError>;

    /// Read-only fetch used after completion.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is malformed.
    async fn fetch_attempt_for_review(&self, attempt: AttemptId) -> Result<Attempt, ApiError>;
}
