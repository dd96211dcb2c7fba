//! Logical (Lamport) clock shared by the consumer and the gossip plane.
//!
//! Orders events across workers without relying on wall-clock synchronization.
//! All operations are monotonic: the counter never moves backward, which makes
//! merges tolerant of duplicate and out-of-order delivery.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically advancing event counter.
///
/// - [`forward`](LamportClock::forward) ticks the clock for a local event.
/// - [`adjust`](LamportClock::adjust) merges a peer's value on receive:
///   the clock becomes `max(local, peer) + 1`, so it never decreases.
#[derive(Debug, Default)]
pub struct LamportClock {
    value: AtomicU64,
}

impl LamportClock {
    /// Creates a clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at the given value.
    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Current value without advancing.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Ticks the clock for a locally-originated event and returns the new value.
    pub fn forward(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Merges a value observed from a peer and returns the new local value.
    ///
    /// The result is `max(local, other) + 1`; merging a peer value lower than
    /// the local one still advances the clock and never rewinds it.
    pub fn adjust(&self, other: u64) -> u64 {
        let mut current = self.value.load(Ordering::SeqCst);
        loop {
            let next = current.max(other) + 1;
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}
