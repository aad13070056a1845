use exam_core::model::{AttemptId, Position};

use crate::repository::StorageError;

pub(crate) fn attempt_key(id: AttemptId) -> String {
    id.to_string()
}

pub(crate) fn position_to_i64(position: Position) -> i64 {
    i64::from(position.value())
}

pub(crate) fn position_from_i64(v: i64) -> Result<Position, StorageError> {
    u32::try_from(v)
        .ok()
        .and_then(Position::new)
        .ok_or_else(|| StorageError::Serialization(format!("invalid cursor position {v}")))
}
