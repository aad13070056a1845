mod attempt;
mod ids;
mod question;

pub use attempt::{Attempt, AttemptError, AttemptStatus, QuestionSlot, TestType};
pub use ids::{AttemptId, OptionId, ParseIdError, Position, QuestionId};
pub use question::{AnswerOption, Difficulty, Question};
