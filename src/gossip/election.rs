//! Election proposals and their deterministic ordering.
//!
//! Every worker accumulates the proposals it observed for one election id in
//! a min-heap ordered by [`election_order`]; because the comparator is a pure
//! function of the proposal, all workers that observed the same set of
//! proposals agree on the winner without a central coordinator.

use std::cmp::Ordering;

use serde::Deserialize;

/// One proposal to perform `action` under `topic`.
///
/// Deserialized straight from the wire payload; a payload missing any field
/// (most commonly `clock`) fails deserialization and is dropped by the
/// receiver without touching consensus state.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElectionRequest {
    /// Correlation key chosen by the proposer.
    pub id: String,
    /// Proposer's logical clock from the transport envelope.
    pub clock: u64,
    /// Proposer hostname from the transport envelope.
    pub hostname: String,
    /// Proposer pid from the transport envelope.
    pub pid: u32,
    /// Namespace of the action.
    pub topic: String,
    /// Opaque argument handed to the winning handler.
    pub action: String,
    /// Proposer's logical-clock value at proposal time.
    pub cver: u64,
}

/// Total order on proposals: lower clock wins, ties broken by
/// lexicographically smaller hostname, then by pid.
///
/// Named and tested on its own so the ordering contract is explicit rather
/// than an implicit tuple comparison.
pub fn election_order(a: &ElectionRequest, b: &ElectionRequest) -> Ordering {
    a.clock
        .cmp(&b.clock)
        .then_with(|| a.hostname.cmp(&b.hostname))
        .then_with(|| a.pid.cmp(&b.pid))
}

impl Ord for ElectionRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        election_order(self, other)
    }
}

impl PartialOrd for ElectionRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
