// ABOUTME: Restart rate limiting for the preview process
// ABOUTME: A monotonic-clock window marked on each launch attempt

use std::time::Duration;
use tokio::time::Instant;

/// Minimum interval between restart attempts.
///
/// Marked on every actual launch attempt, never on health checks.
#[derive(Debug, Clone)]
pub struct CooldownWindow {
    duration: Duration,
    last_attempt: Option<Instant>,
}

impl CooldownWindow {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last_attempt: None,
        }
    }

    /// Time left before another attempt is allowed, `None` if allowed now
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.duration {
            Some(self.duration - elapsed)
        } else {
            None
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    pub fn mark_at(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    pub fn mark(&mut self) {
        self.mark_at(Instant::now());
    }

    pub fn reset(&mut self) {
        self.last_attempt = None;
    }
}
