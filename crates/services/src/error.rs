//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AttemptId, AttemptStatus, OptionId, Position};

/// Errors returned by the attempt API collaborator.
///
/// `Clone` so one completion result can be handed to every caller awaiting it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Errors that stop an attempt from being opened. These are terminal for the view.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("failed to load attempt: {0}")]
    Api(#[from] ApiError),
    #[error("attempt {attempt} is {} and can only be reviewed", .status.as_str())]
    NotInProgress {
        attempt: AttemptId,
        status: AttemptStatus,
    },
}

/// Errors emitted by session operations that the caller can recover from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("attempt is {} and no longer accepts answers", .0.as_str())]
    NotInProgress(AttemptStatus),
    #[error("attempt is being submitted")]
    Completing,
    #[error("position {position} is outside 1..={total}")]
    OutOfRange { position: Position, total: u32 },
    #[error("option {option} is not an answer to question {position}")]
    UnknownOption { position: Position, option: OptionId },
    #[error("question {position} has no choice {index}")]
    NoSuchChoice { position: Position, index: usize },
}

/// Errors emitted by the completion protocol. The attempt stays in progress.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("{} answer(s) failed to sync", .positions.len())]
    Unsynced { positions: Vec<Position> },
    #[error("failed to finalize attempt: {0}")]
    Finalize(ApiError),
    #[error("submission stopped before it finished: {0}")]
    Interrupted(String),
}

impl CompletionError {
    /// Positions whose answers are still not confirmed by the server.
    #[must_use]
    pub fn unsynced_positions(&self) -> &[Position] {
        match self {
            CompletionError::Unsynced { positions } => positions,
            CompletionError::Finalize(_) | CompletionError::Interrupted(_) => &[],
        }
    }
}
