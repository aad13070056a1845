use exam_core::model::{AttemptStatus, Position};
use exam_core::time::format_countdown;

/// Below this many seconds the countdown is shown as a warning.
pub const LOW_TIME_THRESHOLD_SECS: u64 = 600;

/// Per-position state for the question grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotIndicator {
    Current,
    Answered,
    Unanswered,
}

/// Aggregated view of an attempt in progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub status: AttemptStatus,
    pub current: Position,
    pub total: u32,
    pub answered: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub remaining_seconds: u64,
    pub is_completing: bool,
    /// One entry per position, in order.
    pub indicators: Vec<SlotIndicator>,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        usize::try_from(self.total)
            .unwrap_or(usize::MAX)
            .saturating_sub(self.answered)
    }

    #[must_use]
    pub fn countdown_label(&self) -> String {
        format_countdown(self.remaining_seconds)
    }

    #[must_use]
    pub fn is_low_time(&self) -> bool {
        self.remaining_seconds < LOW_TIME_THRESHOLD_SECS
    }

    /// True when every answer the user gave has been confirmed.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.pending == 0 && self.in_flight == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(remaining_seconds: u64) -> SessionProgress {
        SessionProgress {
            status: AttemptStatus::InProgress,
            current: Position::FIRST,
            total: 40,
            answered: 12,
            pending: 1,
            in_flight: 0,
            remaining_seconds,
            is_completing: false,
            indicators: vec![SlotIndicator::Current, SlotIndicator::Unanswered],
        }
    }

    #[test]
    fn low_time_starts_under_ten_minutes() {
        assert!(!progress(600).is_low_time());
        assert!(progress(599).is_low_time());
    }

    #[test]
    fn derived_counts_and_label() {
        let p = progress(3725);
        assert_eq!(p.unanswered(), 28);
        assert_eq!(p.countdown_label(), "01:02:05");
        assert!(!p.is_synced());
    }
}
