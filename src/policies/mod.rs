//! Retry and restart policies for the consumer loop.
//!
//! - [`BackoffPolicy`] + [`JitterPolicy`]: how long to wait between broker
//!   connection attempts.
//! - [`RestartState`]: how often the blueprint may be restarted before the
//!   loop escalates into a cooldown.

mod backoff;
mod jitter;
mod restart;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use restart::RestartState;
