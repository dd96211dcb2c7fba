//! Heart bootstep: periodic liveness beacon.

use std::sync::Arc;
use std::time::Duration;

use crate::consumer::ConsumerContext;
use crate::error::ConsumerError;
use crate::events::{Dispatch, EventBody};
use crate::runtime::{Timer, TimerHandle};

/// Wraps a [`Heartbeat`] emitter bound to the shared timer and the event
/// dispatcher. Enabled only when the consumer actually has a dispatcher;
/// starting twice never creates a second emitter while one is set.
pub struct Heart {
    _priv: (),
}

impl Heart {
    /// Creates the step.
    pub fn new() -> Self {
        Self { _priv: () }
    }

    fn enabled(ctx: &ConsumerContext) -> bool {
        ctx.dispatcher.is_some() && ctx.config.heartbeat_enabled()
    }

    pub(crate) fn create(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        ctx.heart = None;
        Ok(())
    }

    pub(crate) fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if !Self::enabled(ctx) || ctx.heart.is_some() {
            return Ok(());
        }
        let (Some(dispatcher), Some(timer)) = (ctx.dispatcher.clone(), ctx.timer.clone()) else {
            return Ok(());
        };
        ctx.heart = Some(Heartbeat::start(
            timer,
            dispatcher,
            ctx.config.heartbeat_interval,
        ));
        Ok(())
    }

    pub(crate) fn stop(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if let Some(heart) = ctx.heart.take() {
            heart.stop();
        }
        Ok(())
    }
}

impl Default for Heart {
    fn default() -> Self {
        Self::new()
    }
}

/// Running heartbeat emitter.
///
/// Announces `worker-online` immediately, beacons `worker-heartbeat` on every
/// interval tick and says `worker-offline` on stop.
pub struct Heartbeat {
    tref: TimerHandle,
    dispatcher: Arc<dyn Dispatch>,
}

impl Heartbeat {
    /// Starts beaconing on `interval`.
    pub fn start(
        timer: Arc<dyn Timer>,
        dispatcher: Arc<dyn Dispatch>,
        interval: Duration,
    ) -> Self {
        dispatcher.send(EventBody::Online);
        let beacon = dispatcher.clone();
        let tref = timer.apply_interval(
            interval,
            Box::new(move || beacon.send(EventBody::Heartbeat)),
        );
        Self { tref, dispatcher }
    }

    /// Cancels the beacon and announces the shutdown.
    pub fn stop(self) {
        self.tref.cancel();
        self.dispatcher.send(EventBody::Offline);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::testkit;

    #[tokio::test]
    async fn start_announces_online_and_is_idempotent() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut step = Heart::new();
        step.create(&mut ctx).unwrap();

        step.start(&mut ctx).unwrap();
        assert!(ctx.heart.is_some());
        assert_eq!(connection.sent_bodies(), vec![EventBody::Online]);

        // A second start must not spawn a second emitter.
        step.start(&mut ctx).unwrap();
        assert_eq!(connection.sent_bodies(), vec![EventBody::Online]);
    }

    #[tokio::test]
    async fn disabled_without_a_dispatcher() {
        let (mut ctx, _connection, _commands) = testkit::context("foo@x.com");
        ctx.dispatcher = None;
        let mut step = Heart::new();
        step.create(&mut ctx).unwrap();
        step.start(&mut ctx).unwrap();
        assert!(ctx.heart.is_none());
    }

    #[tokio::test]
    async fn disabled_by_configuration() {
        let (mut ctx, _connection, _commands) = testkit::context("foo@x.com");
        ctx.config.without_heartbeat = true;
        let mut step = Heart::new();
        step.create(&mut ctx).unwrap();
        step.start(&mut ctx).unwrap();
        assert!(ctx.heart.is_none());
    }

    #[tokio::test]
    async fn stop_says_goodbye_and_tolerates_double_stop() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut step = Heart::new();
        step.create(&mut ctx).unwrap();
        step.start(&mut ctx).unwrap();

        step.stop(&mut ctx).unwrap();
        assert!(ctx.heart.is_none());
        assert_eq!(
            connection.sent_bodies(),
            vec![EventBody::Online, EventBody::Offline]
        );

        step.stop(&mut ctx).unwrap();
    }
}
