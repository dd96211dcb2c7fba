//! Tasks bootstep: task consumer and QoS window.

use std::sync::Arc;

use crate::config::INITIAL_PREFETCH_COUNT;
use crate::consumer::ConsumerContext;
use crate::error::{ConnectionError, ConsumerError};
use crate::runtime::TaskConsumer;

/// Creates the task consumer on start and applies the initial prefetch count
/// as the quality-of-service window, before any task-bucket rate limiting
/// narrows admission further. Stop cancels the consumer and clears the QoS
/// handle; stopping twice, or before starting, is a no-op.
pub struct Tasks {
    _priv: (),
}

impl Tasks {
    /// Creates the step.
    pub fn new() -> Self {
        Self { _priv: () }
    }

    pub(crate) fn create(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        ctx.task_consumer = None;
        ctx.qos = None;
        Ok(())
    }

    pub(crate) async fn start(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        let consumer = ctx
            .connection
            .create_task_consumer(INITIAL_PREFETCH_COUNT)
            .await?;
        ctx.qos = Some(Qos::new(consumer.clone(), INITIAL_PREFETCH_COUNT));
        ctx.task_consumer = Some(consumer);
        Ok(())
    }

    pub(crate) fn stop(&mut self, ctx: &mut ConsumerContext) -> Result<(), ConsumerError> {
        if let Some(consumer) = ctx.task_consumer.take() {
            consumer.cancel();
        }
        ctx.qos = None;
        Ok(())
    }
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefetch (QoS) window of the task consumer.
///
/// Tracks the current value and pushes changes to the broker channel.
pub struct Qos {
    channel: Arc<dyn TaskConsumer>,
    value: u32,
}

impl Qos {
    /// Wraps a channel whose prefetch is already at `initial`.
    pub fn new(channel: Arc<dyn TaskConsumer>, initial: u32) -> Self {
        Self {
            channel,
            value: initial,
        }
    }

    /// Current window size.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Sets the window to an absolute value.
    pub fn set(&mut self, value: u32) -> Result<(), ConnectionError> {
        self.value = value;
        self.channel.set_prefetch(value)
    }

    /// Widens the window by `n`.
    pub fn increment(&mut self, n: u32) -> Result<(), ConnectionError> {
        self.set(self.value.saturating_add(n))
    }

    /// Narrows the window by `n`; the window never goes below zero.
    pub fn decrement(&mut self, n: u32) -> Result<(), ConnectionError> {
        self.set(self.value.saturating_sub(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::testkit;

    #[tokio::test]
    async fn start_applies_the_initial_prefetch_window() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut step = Tasks::new();
        step.create(&mut ctx).unwrap();
        assert!(ctx.task_consumer.is_none());
        assert!(ctx.qos.is_none());

        step.start(&mut ctx).await.unwrap();

        let consumers = connection.task_consumers.lock();
        assert_eq!(consumers.len(), 1);
        assert_eq!(consumers[0].initial_prefetch, INITIAL_PREFETCH_COUNT);
        assert_eq!(ctx.qos.as_ref().unwrap().value(), 2);
    }

    #[tokio::test]
    async fn stop_cancels_the_consumer_and_clears_qos() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut step = Tasks::new();
        step.create(&mut ctx).unwrap();
        step.start(&mut ctx).await.unwrap();

        step.stop(&mut ctx).unwrap();

        assert!(ctx.task_consumer.is_none());
        assert!(ctx.qos.is_none());
        assert!(connection.task_consumers.lock()[0].cancelled());
    }

    #[tokio::test]
    async fn stop_before_start_and_double_stop_are_no_ops() {
        let (mut ctx, _connection, _commands) = testkit::context("foo@x.com");
        let mut step = Tasks::new();
        step.create(&mut ctx).unwrap();
        step.stop(&mut ctx).unwrap();

        step.start(&mut ctx).await.unwrap();
        step.stop(&mut ctx).unwrap();
        step.stop(&mut ctx).unwrap();
    }

    #[tokio::test]
    async fn qos_moves_the_window_through_the_channel() {
        let (mut ctx, connection, _commands) = testkit::context("foo@x.com");
        let mut step = Tasks::new();
        step.create(&mut ctx).unwrap();
        step.start(&mut ctx).await.unwrap();

        let qos = ctx.qos.as_mut().unwrap();
        qos.increment(3).unwrap();
        assert_eq!(qos.value(), 5);
        qos.decrement(10).unwrap();
        assert_eq!(qos.value(), 0);

        let consumers = connection.task_consumers.lock();
        assert_eq!(consumers[0].prefetch_calls(), vec![5, 0]);
    }
}
