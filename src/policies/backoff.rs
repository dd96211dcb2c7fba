//! Backoff policy for broker connection retries.
//!
//! [`BackoffPolicy`] controls how the delay between connection attempts grows
//! while the broker stays unreachable. The delay for attempt `n` is
//! `first × factor^n`, clamped to `max`, with jitter applied last. The base
//! delay is derived purely from the attempt number, so jitter output never
//! feeds back into later calculations.

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Connection retry backoff.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Cap applied to every computed delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to the clamped base delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `max = 30s`, `factor = 2.0`, no jitter: a broker outage
    /// backs off 1s, 2s, 4s, ... and settles at 30s between attempts.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given attempt number (0-indexed).
    ///
    /// Overflow, non-finite intermediates and `factor < 1.0` edge cases all
    /// clamp to [`BackoffPolicy::max`] rather than producing surprises.
    pub fn next(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw_secs = self.first.as_secs_f64() * self.factor.powi(exponent);

        let base = if !raw_secs.is_finite() || raw_secs < 0.0 || raw_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw_secs)
        };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(first_ms: u64, max_secs: u64, factor: f64) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_secs(max_secs),
            factor,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn first_attempt_uses_initial_delay() {
        assert_eq!(plain(100, 30, 2.0).next(0), Duration::from_millis(100));
    }

    #[test]
    fn grows_exponentially_without_jitter() {
        let policy = plain(100, 30, 2.0);
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn clamps_to_max() {
        assert_eq!(plain(100, 1, 2.0).next(10), Duration::from_secs(1));
        assert_eq!(plain(100, 60, 2.0).next(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn first_exceeding_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn full_jitter_stays_within_base() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::Full,
        };
        for attempt in 0..50 {
            assert!(policy.next(attempt) <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn equal_jitter_keeps_lower_half() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::Equal,
        };
        for attempt in 0..50 {
            let delay = policy.next(attempt);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
    }
}
