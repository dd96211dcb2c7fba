//! Mingle bootstep: startup synchronization with the rest of the cluster.

use std::time::Instant;

use tracing::{debug, info};

use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;

/// Runs once at startup: asks every reachable peer to say `hello`, merges
/// every well-formed reply's logical clock (a monotonic max-merge) and revoked
/// task ids into the local state. Error replies are skipped, and an empty
/// reply set is a valid, silent outcome — a single-node cluster.
pub struct Mingle {
    _priv: (),
}

impl Mingle {
    /// Creates the step.
    pub fn new() -> Self {
        Self { _priv: () }
    }

    fn enabled(ctx: &ConsumerContext) -> bool {
        ctx.config.mingle_enabled && ctx.inspect.is_some()
    }

    pub(crate) fn create(&mut self, _ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        Ok(())
    }

    pub(crate) async fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if !Self::enabled(ctx) {
            return Ok(());
        }
        let Some(inspect) = ctx.inspect.clone() else {
            return Ok(());
        };

        info!("mingle: searching for neighbors");
        let replies = inspect.hello().await;
        if replies.is_empty() {
            info!("mingle: all alone");
            return Ok(());
        }

        let now = Instant::now();
        let mut synced = 0usize;
        for (peer, reply) in replies {
            match reply.clock {
                Some(peer_clock) => {
                    ctx.clock.adjust(peer_clock);
                    if let Some(revoked) = reply.revoked {
                        ctx.revoked.merge(revoked, now);
                    }
                    synced += 1;
                }
                None => {
                    debug!(peer = %peer, error = ?reply.error, "mingle: peer could not answer");
                }
            }
        }
        info!("mingle: synced with {synced} nodes");
        Ok(())
    }

    pub(crate) fn stop(&mut self, _ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        Ok(())
    }
}

impl Default for Mingle {
    fn default() -> Self {
        Self::new()
    }
}
