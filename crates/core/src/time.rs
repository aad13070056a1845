use chrono::{DateTime, Duration, Utc};

/// A clock abstraction so the session engine can be driven with deterministic time.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

//
// ─── COUNTDOWN ARITHMETIC ──────────────────────────────────────────────────────
//

/// Seconds left on an attempt: `max(0, limit - (now - started_at))`.
///
/// `started_at` is the server-assigned start of the attempt. Elapsed time is
/// floored to whole seconds; a start in the future counts as zero elapsed.
#[must_use]
pub fn remaining_seconds(started_at: DateTime<Utc>, limit: Duration, now: DateTime<Utc>) -> u64 {
    let elapsed = now.signed_duration_since(started_at).num_seconds().max(0);
    let limit = limit.num_seconds().max(0);
    u64::try_from(limit.saturating_sub(elapsed)).unwrap_or(0)
}

/// Formats a second count as `HH:MM:SS`.
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
