//! Lifecycle modules sequenced by the blueprint.
//!
//! Each bootstep brings one facet of the consumer up and down:
//!
//! | Step   | Responsibility                                             |
//! |--------|------------------------------------------------------------|
//! | Tasks  | task consumer + initial prefetch window                    |
//! | Mingle | startup handshake: clock merge + revoked-set sync          |
//! | Gossip | membership, election, periodic sweep                       |
//! | Heart  | heartbeat beacon on the event dispatcher                   |
//! | Agent  | optional user agent bound to the connection                |
//!
//! Steps are a closed set, so they are modeled as one sum type rather than
//! trait objects: the blueprint holds a `Vec<Bootstep>` it can sort, match on
//! and rebuild without dynamic dispatch. Every variant exposes the same
//! `create`/`start`/`stop` surface and declares the steps it depends on.

mod agent;
mod gossip;
mod heart;
mod mingle;
mod tasks;

pub use agent::Agent;
pub use gossip::GossipStep;
pub use heart::{Heart, Heartbeat};
pub use mingle::Mingle;
pub use tasks::{Qos, Tasks};

use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;

/// One lifecycle module managed by the blueprint.
pub enum Bootstep {
    /// Task consumer and QoS window.
    Tasks(Tasks),
    /// Startup handshake.
    Mingle(Mingle),
    /// Membership and election.
    Gossip(GossipStep),
    /// Heartbeat beacon.
    Heart(Heart),
    /// Optional user agent.
    Agent(Agent),
}

impl Bootstep {
    /// The default step set, in declaration (not yet dependency) order.
    pub fn default_steps() -> Vec<Bootstep> {
        vec![
            Bootstep::Heart(Heart::new()),
            Bootstep::Agent(Agent::new()),
            Bootstep::Gossip(GossipStep::new()),
            Bootstep::Mingle(Mingle::new()),
            Bootstep::Tasks(Tasks::new()),
        ]
    }

    /// Stable step name, also used in dependency declarations.
    pub fn name(&self) -> &'static str {
        match self {
            Bootstep::Tasks(_) => "Tasks",
            Bootstep::Mingle(_) => "Mingle",
            Bootstep::Gossip(_) => "Gossip",
            Bootstep::Heart(_) => "Heart",
            Bootstep::Agent(_) => "Agent",
        }
    }

    /// Steps that must start before this one.
    pub fn requires(&self) -> &'static [&'static str] {
        match self {
            Bootstep::Tasks(_) => &[],
            Bootstep::Mingle(_) => &["Tasks"],
            Bootstep::Gossip(_) => &["Mingle"],
            Bootstep::Heart(_) => &["Gossip"],
            Bootstep::Agent(_) => &["Heart"],
        }
    }

    /// Prepares the step's resources; runs for every step before any starts.
    pub fn create(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        match self {
            Bootstep::Tasks(step) => step.create(ctx),
            Bootstep::Mingle(step) => step.create(ctx),
            Bootstep::Gossip(step) => step.create(ctx),
            Bootstep::Heart(step) => step.create(ctx),
            Bootstep::Agent(step) => step.create(ctx),
        }
    }

    /// Brings the step up.
    pub async fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        match self {
            Bootstep::Tasks(step) => step.start(ctx).await,
            Bootstep::Mingle(step) => step.start(ctx).await,
            Bootstep::Gossip(step) => step.start(ctx),
            Bootstep::Heart(step) => step.start(ctx),
            Bootstep::Agent(step) => step.start(ctx).await,
        }
    }

    /// Tears the step down; every variant tolerates double-stop and
    /// stop-before-start.
    pub async fn stop(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        match self {
            Bootstep::Tasks(step) => step.stop(ctx),
            Bootstep::Mingle(step) => step.stop(ctx),
            Bootstep::Gossip(step) => step.stop(ctx),
            Bootstep::Heart(step) => step.stop(ctx),
            Bootstep::Agent(step) => step.stop(ctx).await,
        }
    }
}
