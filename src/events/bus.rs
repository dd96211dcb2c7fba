//! Loopback gossip bus.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] playing the
//! role of the message-bus transport for in-process clusters and tests: it
//! stamps outbound bodies with the sender identity and logical clock (the
//! envelope is the transport's responsibility, never the caller's) and fans
//! the resulting [`Message`] out to every subscriber — including the sender,
//! which is exactly what the election protocol relies on.
//!
//! ## Rules
//! - **Non-blocking publish**: `send` never waits; a bus with no subscribers
//!   drops the message.
//! - **Bounded capacity**: slow receivers observe `RecvError::Lagged` and
//!   skip the oldest items.
//! - **Clock stamping**: every send ticks the shared [`LamportClock`].

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::clock::LamportClock;
use crate::events::event::{Envelope, EventBody, Message};
use crate::state::WorkerIdentity;

/// Outbound half of the gossip transport.
///
/// Implementations stamp the envelope (hostname, pid, clock) and deliver the
/// message to every worker on the bus, the sender included.
pub trait Dispatch: Send + Sync {
    /// Broadcasts one event body.
    fn send(&self, body: EventBody);
}

/// In-process broadcast transport.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Message>,
    identity: WorkerIdentity,
    clock: Arc<LamportClock>,
}

impl Bus {
    /// Creates a bus for `identity` with the given channel capacity
    /// (clamped to at least 1).
    pub fn new(capacity: usize, identity: WorkerIdentity, clock: Arc<LamportClock>) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            identity,
            clock,
        }
    }

    /// A second worker's view of the same bus.
    ///
    /// Shares the channel but stamps envelopes with the other identity and
    /// clock; used to simulate multi-worker clusters in one process.
    pub fn peer(&self, identity: WorkerIdentity, clock: Arc<LamportClock>) -> Self {
        Self {
            tx: self.tx.clone(),
            identity,
            clock,
        }
    }

    /// Subscribes to every message sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// The identity this bus stamps envelopes with.
    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    /// The clock this bus stamps envelopes with.
    pub fn clock(&self) -> Arc<LamportClock> {
        self.clock.clone()
    }

    /// Injects a pre-built message, bypassing envelope stamping.
    ///
    /// Test seam for malformed or foreign traffic.
    pub fn publish_raw(&self, message: Message) {
        let _ = self.tx.send(message);
    }
}

impl Dispatch for Bus {
    fn send(&self, body: EventBody) {
        let envelope = Envelope {
            hostname: self.identity.hostname.clone(),
            pid: self.identity.pid,
            clock: self.clock.forward(),
            body,
        };
        let _ = self.tx.send(envelope.into_message());
    }
}
