use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use exam_core::model::Position;

use crate::error::SessionError;

/// Current question pointer plus how long each question has been on screen.
#[derive(Debug, Clone)]
pub(crate) struct NavigationCursor {
    total: u32,
    current: Position,
    entered_at: DateTime<Utc>,
    dwell: BTreeMap<Position, i64>,
}

impl NavigationCursor {
    /// `start` must already be validated against `total`.
    pub(crate) fn new(total: u32, start: Position, now: DateTime<Utc>) -> Self {
        Self {
            total,
            current: start,
            entered_at: now,
            dwell: BTreeMap::new(),
        }
    }

    pub(crate) fn current(&self) -> Position {
        self.current
    }

    pub(crate) fn total(&self) -> u32 {
        self.total
    }

    pub(crate) fn check(&self, position: Position) -> Result<(), SessionError> {
        if position.within(self.total) {
            Ok(())
        } else {
            Err(SessionError::OutOfRange {
                position,
                total: self.total,
            })
        }
    }

    /// Jump to `position`. Returns `true` if the cursor moved.
    pub(crate) fn go_to(
        &mut self,
        position: Position,
        now: DateTime<Utc>,
    ) -> Result<bool, SessionError> {
        self.check(position)?;
        Ok(self.move_to(position, now))
    }

    /// Advance by one, staying on the last question.
    pub(crate) fn next(&mut self, now: DateTime<Utc>) -> bool {
        match Position::new(self.current.value() + 1).filter(|p| p.within(self.total)) {
            Some(next) => self.move_to(next, now),
            None => false,
        }
    }

    /// Step back by one, staying on the first question.
    pub(crate) fn previous(&mut self, now: DateTime<Utc>) -> bool {
        match self.current.value().checked_sub(1).and_then(Position::new) {
            Some(prev) => self.move_to(prev, now),
            None => false,
        }
    }

    /// Seconds `position` has been displayed so far, including the open visit.
    pub(crate) fn time_spent(&self, position: Position, now: DateTime<Utc>) -> u32 {
        let mut seconds = self.dwell.get(&position).copied().unwrap_or(0);
        if position == self.current {
            seconds += open_visit(self.entered_at, now);
        }
        u32::try_from(seconds).unwrap_or(u32::MAX)
    }

    fn move_to(&mut self, position: Position, now: DateTime<Utc>) -> bool {
        if position == self.current {
            return false;
        }
        *self.dwell.entry(self.current).or_insert(0) += open_visit(self.entered_at, now);
        self.current = position;
        self.entered_at = now;
        true
    }
}

fn open_visit(entered_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(entered_at).num_seconds().max(0)
}
