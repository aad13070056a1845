use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

use super::countdown::Tick;
use super::service::AttemptSession;
use crate::api::AttemptResult;
use crate::error::CompletionError;

const TICK: Duration = Duration::from_secs(1);

/// Drive the countdown one second at a time and submit the attempt when it
/// reaches zero.
///
/// If the attempt was already out of time when loaded, completion starts
/// immediately. Returns `None` when the countdown was stopped first, i.e. the
/// attempt was completed by other means or the session was closed.
pub async fn run_countdown(
    session: AttemptSession,
) -> Option<Result<AttemptResult, CompletionError>> {
    if session.expire_if_elapsed() {
        info!(attempt_id = %session.id(), "time limit already elapsed, submitting");
        return Some(session.complete().await);
    }

    let mut ticks = interval_at(Instant::now() + TICK, TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        match session.tick() {
            Tick::Running(_) => {}
            Tick::Expired => {
                info!(attempt_id = %session.id(), "time is up, submitting");
                return Some(session.complete().await);
            }
            Tick::Stopped => return None,
        }
    }
}
