//! Worker-local view of the cluster.
//!
//! - [`ClusterState`]: approximate membership built from gossip events.
//! - [`RevokedSet`]: task ids that must never be executed, synced at startup.

mod cluster;
mod revoked;

pub use cluster::{ClusterState, Transition, WorkerIdentity, WorkerRecord};
pub use revoked::RevokedSet;
