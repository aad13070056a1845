/// Result of advancing the countdown by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running(u64),
    /// Reported once, on the tick that reaches zero.
    Expired,
    Stopped,
}

/// Display countdown seeded from the server start time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Countdown {
    remaining: u64,
    expired: bool,
    stopped: bool,
}

impl Countdown {
    pub(crate) fn new(remaining: u64) -> Self {
        Self {
            remaining,
            expired: false,
            stopped: false,
        }
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.remaining
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.stopped && !self.expired
    }

    pub(crate) fn tick(&mut self) -> Tick {
        if !self.is_running() {
            return Tick::Stopped;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    /// Mark the countdown expired if it was seeded at zero. Fires once.
    pub(crate) fn expire_if_elapsed(&mut self) -> bool {
        if self.is_running() && self.remaining == 0 {
            self.expired = true;
            return true;
        }
        false
    }

    /// Re-seed from the server clock, e.g. after the process was suspended.
    pub(crate) fn resync(&mut self, remaining: u64) {
        if self.is_running() {
            self.remaining = remaining;
        }
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut countdown = Countdown::new(2);
        assert_eq!(countdown.tick(), Tick::Running(1));
        assert_eq!(countdown.tick(), Tick::Expired);
        assert_eq!(countdown.tick(), Tick::Stopped);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn zero_seed_expires_immediately_only_once() {
        let mut countdown = Countdown::new(0);
        assert!(countdown.expire_if_elapsed());
        assert!(!countdown.expire_if_elapsed());
        assert_eq!(countdown.tick(), Tick::Stopped);
    }

    #[test]
    fn stopped_countdown_never_expires() {
        let mut countdown = Countdown::new(1);
        countdown.stop();
        assert_eq!(countdown.tick(), Tick::Stopped);
        assert!(!countdown.expire_if_elapsed());
        countdown.resync(0);
        assert_eq!(countdown.remaining(), 1);
    }

    #[test]
    fn resync_can_jump_to_zero() {
        let mut countdown = Countdown::new(300);
        countdown.resync(0);
        assert!(countdown.expire_if_elapsed());
    }
}
