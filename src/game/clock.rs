//! Round timer bookkeeping
//!
//! Tracks elapsed play time across suspend/resume so a resumed round only
//! runs for what is left of it.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    duration: Duration,
    /// Play time accumulated before the current running stretch
    banked: Duration,
    /// Start of the current running stretch, `None` while paused
    running_since: Option<Instant>,
    /// When the clock was last paused
    paused_at: Option<Instant>,
}

impl RoundClock {
    /// A clock that starts running at `now`
    pub fn start(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            banked: Duration::ZERO,
            running_since: Some(now),
            paused_at: None,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let current = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default();
        (self.banked + current).min(self.duration)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration.saturating_sub(self.elapsed(now))
    }

    /// Stop the clock. Returns elapsed play time.
    pub fn pause(&mut self, now: Instant) -> Duration {
        if let Some(since) = self.running_since.take() {
            self.banked += now.saturating_duration_since(since);
            self.paused_at = Some(now);
        }
        self.banked.min(self.duration)
    }

    /// Restart the clock. Returns how long it was paused.
    pub fn resume(&mut self, now: Instant) -> Duration {
        if self.running_since.is_some() {
            return Duration::ZERO;
        }
        self.running_since = Some(now);
        self.paused_at
            .take()
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default()
    }
}
