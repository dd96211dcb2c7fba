//! Cluster membership tracking.
//!
//! [`ClusterState`] is the gossip component's private view of which peers
//! exist and whether they look alive. It is mutated only from the consumer's
//! event loop (by `on_message` handlers and the periodic sweep), so it needs
//! no internal locking.
//!
//! ## Rules
//! - A worker absent from the map is **unknown**, not dead.
//! - Liveness transitions are derived from event kind plus previous state:
//!   `worker-online` on a not-alive record is a join, `worker-offline` on an
//!   alive record is a leave. Heartbeats refresh liveness silently.
//! - Dead peers are pruned by the sweep, never retained.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::events::{WORKER_HEARTBEAT, WORKER_OFFLINE, WORKER_ONLINE};

/// Immutable identity of one worker process.
///
/// No two live workers share a hostname+pid pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerIdentity {
    /// Node name, e.g. `worker1@example.com`.
    pub hostname: String,
    /// OS process id on that host.
    pub pid: u32,
}

impl WorkerIdentity {
    /// Builds an identity from its parts.
    pub fn new(hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
        }
    }
}

impl std::fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.hostname, self.pid)
    }
}

/// What a membership merge observed about a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The peer went from unknown/dead to alive.
    Online,
    /// The peer went from alive to dead.
    Offline,
}

/// Last-known state of one peer.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    /// Who this record is about.
    pub identity: WorkerIdentity,
    /// When we last heard from the peer.
    pub last_seen: Instant,
    /// Highest logical clock observed from the peer.
    pub clock: u64,
    /// Whether the peer currently counts as alive.
    pub alive: bool,
}

impl WorkerRecord {
    /// Convenience accessor for the peer hostname.
    pub fn hostname(&self) -> &str {
        &self.identity.hostname
    }
}

/// Mapping from hostname to the last-known state of that peer.
#[derive(Debug, Default)]
pub struct ClusterState {
    workers: HashMap<String, WorkerRecord>,
}

impl ClusterState {
    /// Creates an empty membership view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one gossip membership event and reports the liveness
    /// transition it caused, if any.
    ///
    /// Unknown event kinds still refresh `last_seen`/`clock` (the peer is
    /// clearly reachable) but never produce a transition.
    pub fn apply(
        &mut self,
        kind: &str,
        hostname: &str,
        pid: u32,
        clock: u64,
        now: Instant,
    ) -> (WorkerRecord, Option<Transition>) {
        let record = self
            .workers
            .entry(hostname.to_string())
            .or_insert_with(|| WorkerRecord {
                identity: WorkerIdentity::new(hostname, pid),
                last_seen: now,
                clock: 0,
                alive: false,
            });

        let was_alive = record.alive;
        record.identity.pid = pid;
        record.last_seen = now;
        record.clock = record.clock.max(clock);

        let transition = match kind {
            WORKER_ONLINE => {
                record.alive = true;
                (!was_alive).then_some(Transition::Online)
            }
            WORKER_OFFLINE => {
                record.alive = false;
                was_alive.then_some(Transition::Offline)
            }
            WORKER_HEARTBEAT => {
                record.alive = true;
                None
            }
            _ => None,
        };
        (record.clone(), transition)
    }

    /// Refreshes the local worker's own record without membership callbacks.
    ///
    /// Keeps the local node counted among alive workers for election quorum
    /// purposes even though its own gossip events never take the join/leave
    /// path.
    pub fn touch(&mut self, identity: &WorkerIdentity, clock: u64, now: Instant) {
        let record = self
            .workers
            .entry(identity.hostname.clone())
            .or_insert_with(|| WorkerRecord {
                identity: identity.clone(),
                last_seen: now,
                clock: 0,
                alive: true,
            });
        record.last_seen = now;
        record.alive = true;
        record.clock = record.clock.max(clock);
    }

    /// Flags every record whose heartbeat is older than `ttl` as not alive.
    pub fn expire(&mut self, ttl: Duration, now: Instant) {
        for record in self.workers.values_mut() {
            if record.alive && now.duration_since(record.last_seen) >= ttl {
                record.alive = false;
            }
        }
    }

    /// Removes and returns every record whose `alive` flag is false.
    ///
    /// Records still alive are preserved untouched.
    pub fn take_dead(&mut self) -> Vec<WorkerRecord> {
        let dead: Vec<String> = self
            .workers
            .iter()
            .filter(|(_, record)| !record.alive)
            .map(|(hostname, _)| hostname.clone())
            .collect();
        dead.into_iter()
            .filter_map(|hostname| self.workers.remove(&hostname))
            .collect()
    }

    /// Hostnames of workers currently flagged alive, sorted for stable logs.
    pub fn alive_workers(&self) -> Vec<String> {
        let mut alive: Vec<String> = self
            .workers
            .values()
            .filter(|record| record.alive)
            .map(|record| record.identity.hostname.clone())
            .collect();
        alive.sort_unstable();
        alive
    }

    /// Number of workers currently flagged alive.
    pub fn alive_count(&self) -> usize {
        self.workers.values().filter(|record| record.alive).count()
    }

    /// Looks up a peer by hostname.
    pub fn get(&self, hostname: &str) -> Option<&WorkerRecord> {
        self.workers.get(hostname)
    }

    /// Total number of known records, dead or alive.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when no worker has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
