//! Gossip bootstep: wires the gossip component into the consumer.

use tracing::debug;

use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;
use crate::gossip::Gossip;

/// Constructs the [`Gossip`] component into the consumer context on create,
/// registers its event routing and periodic sweep on start, and tears the
/// timer down on stop. Requires an event dispatcher and a timer; without
/// either the step stays inert.
pub struct GossipStep {
    _priv: (),
}

impl GossipStep {
    /// Creates the step.
    pub fn new() -> Self {
        Self { _priv: () }
    }

    pub(crate) fn create(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if !ctx.config.gossip_enabled {
            return Ok(());
        }
        let Some(dispatcher) = ctx.dispatcher.clone() else {
            debug!("gossip disabled: no event dispatcher attached");
            return Ok(());
        };
        let Some(timer) = ctx.timer.clone() else {
            debug!("gossip disabled: no timer attached");
            return Ok(());
        };

        ctx.gossip = Some(Gossip::new(
            ctx.identity.clone(),
            ctx.clock.clone(),
            dispatcher,
            timer,
            ctx.pool.clone(),
            ctx.commands.clone(),
            ctx.config.gossip_interval,
            ctx.config.heartbeat_expires,
        ));
        Ok(())
    }

    pub(crate) fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if let Some(gossip) = ctx.gossip.as_mut() {
            gossip.start();
        }
        Ok(())
    }

    pub(crate) fn stop(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if let Some(mut gossip) = ctx.gossip.take() {
            gossip.stop();
        }
        Ok(())
    }
}

impl Default for GossipStep {
    fn default() -> Self {
        Self::new()
    }
}
