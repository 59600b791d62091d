//! Cancellable answer countdown
//!
//! This module implements the single in-flight countdown a question has
//! while teams may still buzz in. The timer is tick-driven: the
//! embedding event loop reports elapsed wall time through the game's
//! `tick`, which forwards it here, so expiry is deterministic and a
//! timer cancelled in the same processing path can never fire late.
//!
//! Consumed time accumulates across cancellations: when the question is
//! handed back after a wrong answer, the countdown resumes from where
//! the previous team left it instead of restarting.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use web_time::Duration;

/// Tick-driven countdown with an elapsed-time accumulator
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerTimer {
    /// Total time a question stays open, across all hand-offs
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    total: Duration,
    /// Time already consumed on the open question
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    elapsed: Duration,
    /// Whether the countdown is currently running
    armed: bool,
}

impl AnswerTimer {
    /// Creates a disarmed timer with the given total answer time
    pub fn new(total: Duration) -> Self {
        Self {
            total,
            elapsed: Duration::ZERO,
            armed: false,
        }
    }

    /// Starts (or resumes) the countdown
    ///
    /// Returns the remaining time. A zero return means the accumulator
    /// has already consumed the whole budget; the caller should treat
    /// the timer as expired immediately instead of waiting for a tick.
    pub fn arm(&mut self) -> Duration {
        let remaining = self.remaining();
        self.armed = !remaining.is_zero();
        remaining
    }

    /// Stops the countdown, keeping the consumed time
    ///
    /// Progress made since arming stays in the accumulator, so a later
    /// `arm` resumes rather than restarts. Cancelling a disarmed timer
    /// is a no-op.
    pub fn cancel(&mut self) {
        self.armed = false;
    }

    /// Advances the countdown by the given wall-time delta
    ///
    /// Returns `true` exactly once per arming, on the tick that crosses
    /// the budget; the timer disarms itself at that point. Ticks while
    /// disarmed are ignored, so a stale tick after a synchronous cancel
    /// never observes or mutates anything.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if !self.armed {
            return false;
        }
        self.elapsed = (self.elapsed + delta).min(self.total);
        if self.elapsed >= self.total {
            self.armed = false;
            true
        } else {
            false
        }
    }

    /// Clears the accumulator for the next question
    pub fn reset(&mut self) {
        debug_assert!(!self.armed);
        self.armed = false;
        self.elapsed = Duration::ZERO;
    }

    /// Returns whether the countdown is currently running
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns the time left before expiry
    pub fn remaining(&self) -> Duration {
        self.total.saturating_sub(self.elapsed)
    }

    /// Returns the time consumed on the open question so far
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn timer() -> AnswerTimer {
        AnswerTimer::new(Duration::from_millis(5000))
    }

    #[test]
    fn test_arm_and_expire() {
        let mut t = timer();
        assert_eq!(t.arm(), Duration::from_millis(5000));
        assert!(t.is_armed());

        assert!(!t.tick(Duration::from_millis(4999)));
        assert!(t.tick(Duration::from_millis(1)));
        assert!(!t.is_armed());
    }

    #[test]
    fn test_expires_once() {
        let mut t = timer();
        t.arm();
        assert!(t.tick(Duration::from_millis(6000)));
        // After expiry the timer is disarmed; further ticks do nothing.
        assert!(!t.tick(Duration::from_millis(1000)));
    }

    #[test]
    fn test_cancel_keeps_progress() {
        let mut t = timer();
        t.arm();
        t.tick(Duration::from_millis(2000));
        t.cancel();
        assert!(!t.is_armed());
        assert_eq!(t.elapsed(), Duration::from_millis(2000));

        // Resuming continues from the accumulator.
        assert_eq!(t.arm(), Duration::from_millis(3000));
        assert!(t.tick(Duration::from_millis(3000)));
    }

    #[test]
    fn test_stale_tick_after_cancel_is_ignored() {
        let mut t = timer();
        t.arm();
        t.cancel();
        assert!(!t.tick(Duration::from_millis(10_000)));
        assert_eq!(t.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_arm_with_exhausted_budget() {
        let mut t = timer();
        t.arm();
        t.tick(Duration::from_millis(2500));
        t.cancel();
        t.arm();
        t.tick(Duration::from_millis(2500));
        t.cancel();

        assert_eq!(t.arm(), Duration::ZERO);
        assert!(!t.is_armed());
    }

    #[test]
    fn test_reset_clears_accumulator() {
        let mut t = timer();
        t.arm();
        t.tick(Duration::from_millis(3000));
        t.cancel();
        t.reset();
        assert_eq!(t.elapsed(), Duration::ZERO);
        assert_eq!(t.remaining(), Duration::from_millis(5000));
    }
}
