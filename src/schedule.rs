use std::time::{Duration, Instant};

pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval refresh ticks. The first tick is due immediately.
#[derive(Clone, Debug)]
pub struct RefreshSchedule {
    interval: Duration,
    next_due: Instant,
}

impl RefreshSchedule {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval: interval.max(MIN_INTERVAL),
            next_due: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Applies a new interval; a shorter one pulls the next tick in.
    pub fn set_interval(&mut self, interval: Duration, now: Instant) {
        self.interval = interval.max(MIN_INTERVAL);
        let latest = now + self.interval;
        if self.next_due > latest {
            self.next_due = latest;
        }
    }

    /// Makes the next `poll` fire regardless of the interval.
    pub fn trigger(&mut self, now: Instant) {
        self.next_due = now;
    }

    /// True once per interval; the next tick is scheduled from `now`, so a slow pass delays
    /// the following one instead of piling up.
    pub fn poll(&mut self, now: Instant) -> bool {
        if now >= self.next_due {
            self.next_due = now + self.interval;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_due.saturating_duration_since(now)
    }
}
