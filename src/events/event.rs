//! Typed gossip event bodies and their wire form.
//!
//! Outbound traffic is fully typed ([`EventBody`]); the transport stamps it
//! into an [`Envelope`] carrying the sender hostname/pid and a logical-clock
//! value. Inbound traffic arrives as a [`Message`] with a routing key and a
//! dynamic JSON payload — handlers validate fields themselves so that one
//! malformed producer cannot crash a receiver.
//!
//! ```text
//! EventBody ──(Bus stamps hostname/pid/clock)──► Envelope ──► Message
//!                                                             │ routing_key
//!                                                             └ payload (JSON)
//! ```

use serde_json::{json, Value};

/// Routing key of the peer-joined announcement.
pub const WORKER_ONLINE: &str = "worker-online";
/// Routing key of the graceful-leave announcement.
pub const WORKER_OFFLINE: &str = "worker-offline";
/// Routing key of the periodic liveness beacon.
pub const WORKER_HEARTBEAT: &str = "worker-heartbeat";
/// Routing key of an election proposal.
pub const WORKER_ELECT: &str = "worker-elect";
/// Routing key of an election acknowledgement.
pub const WORKER_ELECT_ACK: &str = "worker-elect-ack";

/// Body of an outbound gossip event, before envelope stamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    /// Announce this worker as reachable.
    Online,
    /// Announce a graceful shutdown.
    Offline,
    /// Periodic liveness beacon.
    Heartbeat,
    /// Propose that some worker performs `action` under `topic`.
    Elect {
        /// Correlation key, collision-resistant across the cluster for the
        /// lifetime of one election.
        id: String,
        /// Namespace the action belongs to.
        topic: String,
        /// Proposer's logical-clock value at proposal time.
        cver: u64,
        /// Opaque argument handed to the winning handler.
        action: String,
    },
    /// Acknowledge that an election proposal was observed.
    ElectAck {
        /// Correlation key of the election being acknowledged.
        id: String,
    },
}

impl EventBody {
    /// The routing key this body travels under.
    pub fn routing_key(&self) -> &'static str {
        match self {
            EventBody::Online => WORKER_ONLINE,
            EventBody::Offline => WORKER_OFFLINE,
            EventBody::Heartbeat => WORKER_HEARTBEAT,
            EventBody::Elect { .. } => WORKER_ELECT,
            EventBody::ElectAck { .. } => WORKER_ELECT_ACK,
        }
    }
}

/// A stamped gossip event: body plus sender identity and logical clock.
///
/// Stamping is the transport's job; election and membership code never fill
/// these fields in by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender node name.
    pub hostname: String,
    /// Sender process id.
    pub pid: u32,
    /// Sender logical clock at send time.
    pub clock: u64,
    /// The event itself.
    pub body: EventBody,
}

impl Envelope {
    /// Renders the envelope into its wire form: a routing key plus a flat
    /// JSON payload, the shape every receiver parses.
    pub fn into_message(self) -> Message {
        let mut payload = json!({
            "hostname": self.hostname,
            "pid": self.pid,
            "clock": self.clock,
        });
        if let Value::Object(map) = &mut payload {
            match &self.body {
                EventBody::Elect {
                    id,
                    topic,
                    cver,
                    action,
                } => {
                    map.insert("id".into(), json!(id));
                    map.insert("topic".into(), json!(topic));
                    map.insert("cver".into(), json!(cver));
                    map.insert("action".into(), json!(action));
                }
                EventBody::ElectAck { id } => {
                    map.insert("id".into(), json!(id));
                }
                EventBody::Online | EventBody::Offline | EventBody::Heartbeat => {}
            }
        }
        Message {
            routing_key: self.body.routing_key().to_string(),
            payload,
        }
    }
}

/// A gossip message as delivered by the bus.
#[derive(Debug, Clone)]
pub struct Message {
    /// Event kind, e.g. `worker-online`.
    pub routing_key: String,
    /// Flat JSON payload; field presence is validated by each handler.
    pub payload: Value,
}

impl Message {
    /// Sender hostname from the envelope fields, if present.
    pub fn hostname(&self) -> Option<&str> {
        self.payload.get("hostname").and_then(Value::as_str)
    }

    /// Sender logical clock from the envelope fields, if present.
    pub fn clock(&self) -> Option<u64> {
        self.payload.get("clock").and_then(Value::as_u64)
    }

    /// Sender pid from the envelope fields, if present.
    pub fn pid(&self) -> Option<u32> {
        self.payload
            .get("pid")
            .and_then(Value::as_u64)
            .map(|pid| pid as u32)
    }
}

/// Default `prepare` step for [`Gossip::on_message`](crate::Gossip::on_message):
/// extracts the event kind and payload from a delivered message.
pub fn prepare_event(message: &Message) -> (String, Value) {
    (message.routing_key.clone(), message.payload.clone())
}
