mod answers;
mod completion;
mod countdown;
mod navigation;
mod progress;
mod service;
mod timer;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{CompletionError, SessionError};
pub use answers::PendingSubmission;
pub use countdown::Tick;
pub use progress::{LOW_TIME_THRESHOLD_SECS, SessionProgress, SlotIndicator};
pub use service::{AnswerDispatch, AttemptSession, RetryReport, SelectOutcome, WriteOutcome};
pub use timer::run_countdown;
pub use workflow::SessionLoader;
