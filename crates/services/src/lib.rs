#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use api::{AnswerSubmission, ApiConfig, AttemptApi, AttemptResult, HttpAttemptApi};
pub use error::{ApiError, CompletionError, LoadError, SessionError};

pub use sessions::{
    AnswerDispatch, AttemptSession, PendingSubmission, RetryReport, SelectOutcome,
    SessionLoader, SessionProgress, SlotIndicator, Tick, WriteOutcome, run_countdown,
};
