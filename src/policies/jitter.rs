//! Jitter for connection retry delays.
//!
//! When a broker goes down, every worker in the fleet notices at the same
//! moment; jitter spreads the reconnect stampede out.
//!
//! - [`JitterPolicy::None`] — exact delays, predictable.
//! - [`JitterPolicy::Full`] — random in `[0, delay]`.
//! - [`JitterPolicy::Equal`] — `delay/2 + random[0, delay/2]`.
//! - [`JitterPolicy::Decorrelated`] — grows from the previous delay.

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JitterPolicy {
    /// Use the exact backoff delay.
    #[default]
    None,

    /// Random delay in `[0, delay]`; the most aggressive spreading.
    Full,

    /// `delay/2 + random[0, delay/2]`; balanced, keeps at least half the delay.
    Equal,

    /// `random[base, prev × 3]` capped at max; needs context, see
    /// [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    ///
    /// `Decorrelated` is returned unchanged here; it needs the previous delay,
    /// use [`apply_decorrelated`](Self::apply_decorrelated).
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => full_jitter(delay),
            JitterPolicy::Equal => equal_jitter(delay),
        }
    }

    /// Applies decorrelated jitter: `random[base, prev × 3]` capped at `max`.
    ///
    /// Falls back to [`apply`](Self::apply) for the other variants.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let prev_ms = prev.as_millis() as u64;
        let max_ms = max.as_millis() as u64;

        let upper = prev_ms.saturating_mul(3).min(max_ms).max(base_ms);
        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

fn full_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=ms))
}

fn equal_jitter(delay: Duration) -> Duration {
    let ms = delay.as_millis() as u64;
    if ms == 0 {
        return Duration::ZERO;
    }
    let half = ms / 2;
    let extra = if half == 0 {
        0
    } else {
        rand::rng().random_range(0..=half)
    };
    Duration::from_millis(half + extra)
}
