//! Broker connection contract.
//!
//! The consumer never speaks the broker protocol itself; it drives a
//! [`Connection`] collaborator through a small surface: bring the link up
//! (with a retry policy and a per-attempt error callback), expose the inbound
//! gossip stream, create the task consumer, and release resources between
//! restarts.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ConnectionError;
use crate::events::Message;
use crate::policies::BackoffPolicy;

/// Per-attempt retry notification: the error and the 0-indexed attempt number.
pub type RetryCallback<'a> = &'a (dyn Fn(&ConnectionError, u32) + Send + Sync);

/// Injected broker connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Establishes (or re-establishes) the link, retrying per `policy`.
    ///
    /// `errback` is invoked once per failed attempt before the backoff sleep,
    /// so the consumer can log retry progress. Implementations give up and
    /// return the last error once `max_retries` attempts failed
    /// (`None` = retry forever).
    async fn ensure_connected(
        &self,
        policy: &BackoffPolicy,
        max_retries: Option<u32>,
        errback: RetryCallback<'_>,
    ) -> Result<(), ConnectionError>;

    /// Best-effort release of in-flight resources after a connection loss.
    ///
    /// Called between restarts; the consumer swallows any error it returns.
    fn collect(&self) -> Result<(), ConnectionError>;

    /// The inbound gossip event stream.
    ///
    /// The consumer's event loop subscribes once per blueprint start; a
    /// closed stream signals a lost connection.
    fn events(&self) -> broadcast::Receiver<Message>;

    /// Creates the task consumer with its initial prefetch window.
    async fn create_task_consumer(
        &self,
        initial_prefetch: u32,
    ) -> Result<std::sync::Arc<dyn TaskConsumer>, ConnectionError>;
}

/// Handle to the broker-side task subscription.
pub trait TaskConsumer: Send + Sync {
    /// Adjusts the prefetch (QoS) window.
    fn set_prefetch(&self, count: u32) -> Result<(), ConnectionError>;

    /// Cancels the subscription; must be idempotent.
    fn cancel(&self);
}
