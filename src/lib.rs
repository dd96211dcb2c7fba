//! # swarmvisor
//!
//! **swarmvisor** is the worker-side control plane of a distributed
//! task-queue consumer: it keeps the broker connection alive under partial
//! failure, sequences the worker's lifecycle modules through a dependency
//! aware blueprint, and coordinates a fleet of peers through a gossip
//! protocol with an embedded leader election.
//!
//! ## Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Consumer (one per worker process)                                │
//! │  - connect/retry state machine (backoff + RestartState limiter)  │
//! │  - single event loop: bus messages, timer commands, shutdown     │
//! │  - task admission (TaskBucketTable → reserve or defer)           │
//! └──────┬───────────────────────────────────────────────────────────┘
//!        │ start/stop in dependency order
//!        ▼
//! ┌──────────────┐   Tasks → Mingle → Gossip → Heart → Agent
//! │  Blueprint   │   (topologically sorted once at build time)
//! └──────┬───────┘
//!        ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Gossip                                                           │
//! │  - ClusterState: who is alive (periodic sweep prunes the dead)   │
//! │  - on_message: handler table → membership merge → join/leave     │
//! │  - election: worker-elect / worker-elect-ack, winner = minimum   │
//! │    (clock, hostname, pid) once every alive worker acked          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The broker transport, execution pool, timer service, rate-limit buckets
//! and the startup-handshake transport are injected collaborators (see
//! [`runtime`]); the crate ships an in-process loopback [`events::Bus`] and a
//! tokio-backed timer for single-process clusters and tests.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use swarmvisor::{Config, Consumer, TaskRequest};
//! # async fn run(connection: Arc<dyn swarmvisor::runtime::Connection>) -> Result<(), swarmvisor::ConsumerError> {
//! let config = Config::new("worker1@example.com");
//! let mut consumer = Consumer::new(
//!     config,
//!     connection,
//!     Box::new(|request: TaskRequest| {
//!         // hand the admitted request to the execution pool
//!         let _ = request;
//!     }),
//! );
//! consumer.attach_loopback_bus(1024);
//!
//! let shutdown = consumer.shutdown_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     shutdown.cancel();
//! });
//!
//! consumer.start().await?;
//! # Ok(())
//! # }
//! ```

mod blueprint;
mod bootsteps;
mod clock;
mod config;
mod consumer;
mod error;
pub mod events;
mod gossip;
mod policies;
pub mod runtime;
mod state;

// ---- Public re-exports ----

pub use blueprint::{Blueprint, BlueprintState};
pub use bootsteps::{Agent, Bootstep, GossipStep, Heart, Heartbeat, Mingle, Qos, Tasks};
pub use clock::LamportClock;
pub use config::{Config, INITIAL_PREFETCH_COUNT};
pub use consumer::{
    dump_body, Consumer, ConsumerContext, LoopCommand, OnTask, TaskBucket, TaskBucketTable,
    TaskRequest,
};
pub use error::{ConnectionError, ConsumerError, DispatchError, RestartFrequencyExceeded};
pub use gossip::{election_order, ElectionHandler, ElectionRequest, EventHandler, Gossip};
pub use policies::{BackoffPolicy, JitterPolicy, RestartState};
pub use state::{ClusterState, RevokedSet, Transition, WorkerIdentity, WorkerRecord};
