use serde::{Deserialize, Serialize};

use crate::model::ids::{OptionId, QuestionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

/// One selectable answer of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOption {
    pub id: OptionId,
    pub text: String,
    pub order: u32,
}

/// Question content shown for a slot. The engine only carries it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    content: String,
    options: Vec<AnswerOption>,
    difficulty: Difficulty,
    topic: Option<String>,
}

impl Question {
    /// Builds a question; options are kept sorted by their display order.
    #[must_use]
    pub fn new(
        id: QuestionId,
        content: impl Into<String>,
        mut options: Vec<AnswerOption>,
        difficulty: Difficulty,
        topic: Option<String>,
    ) -> Self {
        options.sort_by_key(|option| option.order);
        Self {
            id,
            content: content.into(),
            options,
            difficulty,
            topic,
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Returns true when `option` is one of this question's answers.
    #[must_use]
    pub fn has_option(&self, option: OptionId) -> bool {
        self.options.iter().any(|o| o.id == option)
    }

    /// Option at a 1-based display index, as typed by a user.
    #[must_use]
    pub fn option_at(&self, index: usize) -> Option<&AnswerOption> {
        index.checked_sub(1).and_then(|i| self.options.get(i))
    }
}
