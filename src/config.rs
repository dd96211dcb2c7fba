//! Global consumer configuration.
//!
//! [`Config`] centralizes the settings of one worker process: identity,
//! gossip/heartbeat cadence, restart limiting, connect retry policy and the
//! optional agent. All fields are public; sentinel checks live behind helper
//! accessors rather than being sprinkled across the codebase.

use std::time::Duration;

use crate::policies::BackoffPolicy;
use crate::runtime::AgentFactory;
use crate::state::WorkerIdentity;

/// Initial prefetch (QoS) window applied by the Tasks bootstep before any
/// bucket rate limiting narrows it further.
pub const INITIAL_PREFETCH_COUNT: u32 = 2;

/// Configuration of one consumer process.
#[derive(Clone)]
pub struct Config {
    /// Node name announced to the cluster, e.g. `worker1@example.com`.
    pub hostname: String,
    /// OS process id; combined with `hostname` it uniquely identifies this
    /// worker for gossip and election purposes.
    pub pid: u32,

    /// How often the gossip sweep (`periodic`) runs.
    pub gossip_interval: Duration,
    /// How often the heartbeat beacon fires.
    pub heartbeat_interval: Duration,
    /// How long a silent peer stays alive before the sweep flags it.
    pub heartbeat_expires: Duration,

    /// Whether the startup handshake runs.
    pub mingle_enabled: bool,
    /// Whether the gossip component runs.
    pub gossip_enabled: bool,
    /// Disables the heartbeat bootstep even when a dispatcher is present.
    pub without_heartbeat: bool,

    /// Optional agent bound to the connection at startup.
    pub agent: Option<AgentFactory>,

    /// Restarts tolerated inside [`Config::restart_window`] before the loop
    /// escalates into a cooldown.
    pub max_restarts: usize,
    /// Trailing window for restart-frequency accounting.
    pub restart_window: Duration,
    /// Sleep between retries once the restart frequency was exceeded.
    pub restart_cooldown: Duration,

    /// Backoff between broker connection attempts.
    pub connect_backoff: BackoffPolicy,
    /// Connection attempts before giving up (`None` = retry forever).
    pub connect_max_retries: Option<u32>,

    /// Capacity of the revoked-task set.
    pub revoked_capacity: usize,
    /// Retention horizon of revoked-task entries.
    pub revoked_expires: Duration,
}

impl Config {
    /// Creates a configuration for the given node name with default cadence
    /// and limits.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    /// This worker's identity as announced to peers.
    pub fn identity(&self) -> WorkerIdentity {
        WorkerIdentity::new(self.hostname.clone(), self.pid)
    }

    /// Whether the heartbeat bootstep should run, dispatcher permitting.
    pub fn heartbeat_enabled(&self) -> bool {
        !self.without_heartbeat
    }
}

impl Default for Config {
    /// Defaults:
    /// - identity from `$HOSTNAME` (or `worker@localhost`) and the real pid
    /// - gossip sweep every 5s, heartbeat every 2s, peers expire after 10s
    /// - mingle/gossip/heartbeat enabled, no agent
    /// - 5 restarts per second before the 1s cooldown kicks in
    /// - exponential connect backoff, retry forever
    /// - 50 000 revoked ids retained for 3 hours
    fn default() -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker@localhost".into());
        Self {
            hostname,
            pid: std::process::id(),
            gossip_interval: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(2),
            heartbeat_expires: Duration::from_secs(10),
            mingle_enabled: true,
            gossip_enabled: true,
            without_heartbeat: false,
            agent: None,
            max_restarts: 5,
            restart_window: Duration::from_secs(1),
            restart_cooldown: Duration::from_secs(1),
            connect_backoff: BackoffPolicy::default(),
            connect_max_retries: None,
            revoked_capacity: 50_000,
            revoked_expires: Duration::from_secs(3 * 60 * 60),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("hostname", &self.hostname)
            .field("pid", &self.pid)
            .field("gossip_interval", &self.gossip_interval)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("heartbeat_expires", &self.heartbeat_expires)
            .field("mingle_enabled", &self.mingle_enabled)
            .field("gossip_enabled", &self.gossip_enabled)
            .field("without_heartbeat", &self.without_heartbeat)
            .field("agent", &self.agent.as_ref().map(|_| "<factory>"))
            .field("max_restarts", &self.max_restarts)
            .field("restart_window", &self.restart_window)
            .field("restart_cooldown", &self.restart_cooldown)
            .field("connect_backoff", &self.connect_backoff)
            .field("connect_max_retries", &self.connect_max_retries)
            .field("revoked_capacity", &self.revoked_capacity)
            .field("revoked_expires", &self.revoked_expires)
            .finish()
    }
}
