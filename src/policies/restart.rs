//! Restart-frequency limiter for the consumer loop.
//!
//! A lost broker connection is normal; a connection lost a hundred times a
//! second is a crash loop. [`RestartState`] separates the two: each restart
//! attempt is recorded with [`step`](RestartState::step), and once more than
//! `max_restarts` attempts land inside the trailing `window` the call returns
//! [`RestartFrequencyExceeded`] so the loop can escalate into a cooldown.
//!
//! Pure bookkeeping, no I/O. The caller supplies the current instant, which
//! keeps the type trivially testable.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::RestartFrequencyExceeded;

/// Sliding-window counter of recent restart attempts.
#[derive(Debug, Clone)]
pub struct RestartState {
    max_restarts: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RestartState {
    /// Creates a limiter allowing `max_restarts` attempts per `window`.
    pub fn new(max_restarts: usize, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            timestamps: VecDeque::with_capacity(max_restarts + 1),
        }
    }

    /// Records a restart attempt at `now`.
    ///
    /// Timestamps older than the window are pruned before the check. When the
    /// attempt count inside the window exceeds the maximum, the recorded
    /// history is cleared (so a caller that catches the error resumes with a
    /// fresh window, matching the original limiter) and the error is returned.
    pub fn step(&mut self, now: Instant) -> Result<(), RestartFrequencyExceeded> {
        self.prune(now);
        self.timestamps.push_back(now);
        if self.timestamps.len() > self.max_restarts {
            let restarts = self.timestamps.len();
            self.timestamps.clear();
            return Err(RestartFrequencyExceeded {
                restarts,
                window: self.window,
            });
        }
        Ok(())
    }

    /// Number of attempts currently inside the window.
    pub fn recent(&self) -> usize {
        self.timestamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_within_window() {
        let mut state = RestartState::new(3, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..3 {
            assert!(state.step(now).is_ok());
        }
        assert_eq!(state.recent(), 3);
    }

    #[test]
    fn raises_when_window_overflows_but_not_before() {
        let mut state = RestartState::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(state.step(now).is_ok());
        assert!(state.step(now).is_ok());
        assert!(state.step(now).is_ok());
        let err = state.step(now).unwrap_err();
        assert_eq!(err.restarts, 4);
        assert_eq!(err.window, Duration::from_secs(60));
    }

    #[test]
    fn old_attempts_fall_out_of_the_window() {
        let mut state = RestartState::new(2, Duration::from_secs(10));
        let start = Instant::now();
        assert!(state.step(start).is_ok());
        assert!(state.step(start + Duration::from_secs(1)).is_ok());
        // First two attempts are stale by now; this one fits again.
        assert!(state.step(start + Duration::from_secs(30)).is_ok());
        assert_eq!(state.recent(), 1);
    }

    #[test]
    fn resets_after_raising() {
        let mut state = RestartState::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(state.step(now).is_ok());
        assert!(state.step(now).is_err());
        // History cleared on raise: the next attempt starts a fresh window.
        assert!(state.step(now).is_ok());
    }
}
