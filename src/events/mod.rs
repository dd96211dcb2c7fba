//! Gossip wire events and the loopback bus.
//!
//! Workers coordinate exclusively through broadcast bus messages; this module
//! defines the typed bodies ([`EventBody`]), the transport envelope that
//! stamps each message with the sender identity and logical clock
//! ([`Envelope`]), the loosely-typed delivery form consumed by handlers
//! ([`Message`]) and the in-process [`Bus`] used when no external broker
//! transport is wired in.

mod bus;
mod event;

pub use bus::{Bus, Dispatch};
pub use event::{
    prepare_event, Envelope, EventBody, Message, WORKER_ELECT, WORKER_ELECT_ACK, WORKER_HEARTBEAT,
    WORKER_OFFLINE, WORKER_ONLINE,
};
