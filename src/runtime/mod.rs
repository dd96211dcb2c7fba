//! Injected collaborator contracts.
//!
//! The control plane coordinates components it does not implement: the broker
//! connection, the task execution pool, the timer service, the startup
//! handshake transport and the rate-limiting buckets. Each is specified here
//! as a trait at its call boundary; the crate ships an implementation only
//! where one is needed to run in-process ([`TokioTimer`]).

mod bucket;
mod connection;
mod inspect;
mod pool;
mod timer;

pub use bucket::TokenBucket;
pub use connection::{Connection, RetryCallback, TaskConsumer};
pub use inspect::{HelloReply, Inspect};
pub use pool::{AgentFactory, Controller, Pool, TaskSignature, WorkerAgent};
pub use timer::{OnceCallback, RepeatCallback, Timer, TimerHandle, TokioTimer};
