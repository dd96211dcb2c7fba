//! Timer service contract and the tokio-backed implementation.
//!
//! Deferred and periodic work is scheduled through a [`Timer`] collaborator so
//! the control plane never spawns sleeps ad hoc: every pending entry has a
//! cancellable [`TimerHandle`], and `clear()` drops everything at once during
//! shutdown.
//!
//! Callbacks run on the timer's own task; anything that needs the consumer's
//! single event loop sends itself back into the loop through a channel rather
//! than touching shared state directly.

use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// One-shot callback type for [`Timer::apply_after`].
pub type OnceCallback = Box<dyn FnOnce() + Send>;
/// Repeating callback type for [`Timer::apply_interval`].
pub type RepeatCallback = Box<dyn Fn() + Send + Sync>;

/// Injected timer service.
pub trait Timer: Send + Sync {
    /// Runs `f` once after `delay`. The returned handle cancels the entry.
    fn apply_after(&self, delay: Duration, f: OnceCallback) -> TimerHandle;

    /// Runs `f` every `interval` until the handle is cancelled.
    fn apply_interval(&self, interval: Duration, f: RepeatCallback) -> TimerHandle;

    /// Cancels every pending entry.
    fn clear(&self);
}

/// Cancellation handle for a scheduled entry.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Wraps a token controlling one timer entry.
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A handle that is already cancelled; useful as an inert placeholder.
    pub fn cancelled() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token }
    }

    /// Cancels the entry. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// True once the entry was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Timer backed by the tokio runtime.
///
/// Each entry is a spawned task racing its delay against a child cancellation
/// token; `clear()` cancels the root token and installs a fresh one so later
/// entries are unaffected.
#[derive(Default)]
pub struct TokioTimer {
    root: Mutex<CancellationToken>,
}

impl TokioTimer {
    /// Creates an empty timer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for TokioTimer {
    fn apply_after(&self, delay: Duration, f: OnceCallback) -> TimerHandle {
        let token = self.root.lock().child_token();
        let entry = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = entry.cancelled() => {}
                _ = tokio::time::sleep(delay) => f(),
            }
        });
        TimerHandle::new(token)
    }

    fn apply_interval(&self, interval: Duration, f: RepeatCallback) -> TimerHandle {
        let token = self.root.lock().child_token();
        let entry = token.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of tokio's interval fires immediately; skip it so
            // the first callback lands one full interval after registration.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = entry.cancelled() => break,
                    _ = ticker.tick() => f(),
                }
            }
        });
        TimerHandle::new(token)
    }

    fn clear(&self) {
        let mut root = self.root.lock();
        root.cancel();
        *root = CancellationToken::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn apply_after_fires_once() {
        let timer = TokioTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();
        timer.apply_after(
            Duration::from_millis(50),
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_entry_never_fires() {
        let timer = TokioTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();
        let handle = timer.apply_after(
            Duration::from_millis(50),
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_repeats_until_cancelled() {
        let timer = TokioTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let flag = fired.clone();
        let handle = timer.apply_interval(
            Duration::from_millis(100),
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.cancel();
        let seen = fired.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected at least 3 ticks, saw {seen}");
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_but_not_future_entries() {
        let timer = TokioTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let flag = fired.clone();
        timer.apply_after(
            Duration::from_millis(50),
            Box::new(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }),
        );
        timer.clear();

        let flag = fired.clone();
        timer.apply_after(
            Duration::from_millis(50),
            Box::new(move || {
                flag.fetch_add(10, Ordering::SeqCst);
            }),
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }
}
