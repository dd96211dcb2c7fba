//! Agent bootstep: optional user agent bound to the connection.

use std::sync::Arc;

use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;
use crate::runtime::WorkerAgent;

/// Instantiates the configured agent factory against the broker connection.
/// Without a factory the step is inert: `create` leaves no instance behind
/// and start/stop do nothing.
pub struct Agent {
    instance: Option<Arc<dyn WorkerAgent>>,
}

impl Agent {
    /// Creates the step.
    pub fn new() -> Self {
        Self { instance: None }
    }

    pub(crate) fn create(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if let Some(factory) = ctx.config.agent.clone() {
            self.instance = Some(factory(ctx.connection.clone()));
        }
        Ok(())
    }

    pub(crate) async fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        let _ = ctx;
        if let Some(agent) = &self.instance {
            agent.start().await?;
        }
        Ok(())
    }

    pub(crate) async fn stop(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        let _ = ctx;
        if let Some(agent) = self.instance.take() {
            agent.stop().await;
        }
        Ok(())
    }
}

impl Default for Agent {
    fn default() -> Self {
        Self::new()
    }
}
