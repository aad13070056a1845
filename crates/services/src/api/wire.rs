use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use exam_core::model::{
    AnswerOption, Attempt, AttemptId, AttemptStatus, Difficulty, OptionId, Position, Question,
    QuestionId, QuestionSlot, TestType,
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub(crate) struct AttemptDto {
    id: AttemptId,
    #[serde(default)]
    test_type: TestType,
    status: AttemptStatus,
    time_limit_minutes: i64,
    started_at: DateTime<Utc>,
    #[serde(default)]
    questions: Vec<SlotDto>,
}

#[derive(Debug, Deserialize)]
struct SlotDto {
    position: Position,
    question_id: QuestionId,
    #[serde(default)]
    question: Option<QuestionDto>,
    #[serde(default)]
    answer_id: Option<OptionId>,
    #[serde(default)]
    is_correct: Option<bool>,
    #[serde(default)]
    time_spent_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    id: QuestionId,
    content: String,
    #[serde(default)]
    options: Vec<OptionDto>,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default)]
    topic: Option<TopicDto>,
}

#[derive(Debug, Deserialize)]
struct OptionDto {
    id: OptionId,
    text: String,
    #[serde(default)]
    order: u32,
}

#[derive(Debug, Deserialize)]
struct TopicDto {
    name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitAnswerBody {
    pub selected_option_id: OptionId,
    pub time_spent_seconds: u32,
}

/// Error payloads carry either `error` or `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

impl From<QuestionDto> for Question {
    fn from(dto: QuestionDto) -> Self {
        let options = dto
            .options
            .into_iter()
            .map(|o| AnswerOption {
                id: o.id,
                text: o.text,
                order: o.order,
            })
            .collect();
        Question::new(
            dto.id,
            dto.content,
            options,
            dto.difficulty,
            dto.topic.map(|t| t.name),
        )
    }
}

impl TryFrom<AttemptDto> for Attempt {
    type Error = ApiError;

    fn try_from(dto: AttemptDto) -> Result<Self, Self::Error> {
        let slots = dto
            .questions
            .into_iter()
            .map(|slot| QuestionSlot {
                position: slot.position,
                question_id: slot.question_id,
                question: slot.question.map(Question::from),
                answer: slot.answer_id,
                is_correct: slot.is_correct,
                time_spent_seconds: slot.time_spent_seconds,
            })
            .collect();
        let time_limit = Duration::try_minutes(dto.time_limit_minutes).ok_or_else(|| {
            ApiError::Decode(format!(
                "time limit out of range: {} minutes",
                dto.time_limit_minutes
            ))
        })?;

        Attempt::from_parts(
            dto.id,
            dto.test_type,
            dto.status,
            dto.started_at,
            time_limit,
            slots,
        )
        .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTEMPT_JSON: &str = r#"{
        "id": "0b6f4c3e-3f1d-4d59-8d0e-2d1f0f9a1c11",
        "user_id": "9d1a7a2b-7c55-4a8e-b0d4-5f2a2d3c4b5e",
        "test_type": "full_exam",
        "status": "in_progress",
        "total_questions": 2,
        "correct_answers": 0,
        "score": 0,
        "time_spent_seconds": 0,
        "time_limit_minutes": 90,
        "started_at": "2023-11-14T22:13:20Z",
        "questions": [
            {
                "id": "5d0e1a2b-0000-4000-8000-000000000002",
                "practice_test_id": "0b6f4c3e-3f1d-4d59-8d0e-2d1f0f9a1c11",
                "question_id": "7a1b2c3d-0000-4000-8000-000000000002",
                "position": 2,
                "answer_id": "3e4f5a6b-0000-4000-8000-00000000000b",
                "time_spent_seconds": 41
            },
            {
                "id": "5d0e1a2b-0000-4000-8000-000000000001",
                "practice_test_id": "0b6f4c3e-3f1d-4d59-8d0e-2d1f0f9a1c11",
                "question_id": "7a1b2c3d-0000-4000-8000-000000000001",
                "position": 1,
                "time_spent_seconds": 0,
                "question": {
                    "id": "7a1b2c3d-0000-4000-8000-000000000001",
                    "content": "Which member carries the bending moment?",
                    "difficulty": "hard",
                    "topic": { "name": "Structures" },
                    "options": [
                        { "id": "3e4f5a6b-0000-4000-8000-00000000000b", "text": "Beam", "order": 2 },
                        { "id": "3e4f5a6b-0000-4000-8000-00000000000a", "text": "Tie", "order": 1 }
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn attempt_payload_maps_into_domain() {
        let dto: AttemptDto = serde_json::from_str(ATTEMPT_JSON).unwrap();
        let attempt = Attempt::try_from(dto).unwrap();

        assert_eq!(attempt.total_questions(), 2);
        assert_eq!(attempt.test_type(), TestType::FullExam);
        assert_eq!(attempt.time_limit(), Duration::minutes(90));

        let first = &attempt.slots()[0];
        assert_eq!(first.position, Position::FIRST);
        let question = first.question.as_ref().unwrap();
        assert_eq!(question.topic(), Some("Structures"));
        assert_eq!(question.difficulty(), Difficulty::Hard);
        assert_eq!(question.options()[0].text, "Tie");

        let recorded: Vec<_> = attempt.recorded_answers().collect();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, Position::new(2).unwrap());
    }

    #[test]
    fn malformed_slot_layout_is_a_decode_error() {
        let json = ATTEMPT_JSON.replace("\"position\": 2", "\"position\": 3");
        let dto: AttemptDto = serde_json::from_str(&json).unwrap();
        let err = Attempt::try_from(dto).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn out_of_range_time_limit_is_a_decode_error() {
        let json = ATTEMPT_JSON.replace(
            "\"time_limit_minutes\": 90",
            &format!("\"time_limit_minutes\": {}", i64::MAX),
        );
        let dto: AttemptDto = serde_json::from_str(&json).unwrap();
        let err = Attempt::try_from(dto).unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"test not found","message":"ignored"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("test not found"));

        let body: ErrorBody = serde_json::from_str(r#"{"message":"expired"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("expired"));

        assert_eq!(ErrorBody::default().into_message(), None);
    }

    #[test]
    fn submit_body_uses_server_field_names() {
        let body = SubmitAnswerBody {
            selected_option_id: "3e4f5a6b-0000-4000-8000-00000000000a".parse().unwrap(),
            time_spent_seconds: 12,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["selected_option_id"],
            "3e4f5a6b-0000-4000-8000-00000000000a"
        );
        assert_eq!(json["time_spent_seconds"], 12);
    }
}
