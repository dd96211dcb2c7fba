//! Execution-pool, controller and agent contracts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ConsumerError, DispatchError};

/// A task invocation to be fired at the cluster, not executed locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSignature {
    /// Registered task-type name.
    pub name: String,
    /// Positional arguments, already serialized.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl TaskSignature {
    /// Builds a signature with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// Injected task execution pool.
#[async_trait]
pub trait Pool: Send + Sync {
    /// Flushes buffered writes/acks; called during connection teardown.
    fn flush(&self);

    /// Publishes a task invocation asynchronously.
    async fn apply_async(&self, sig: TaskSignature) -> Result<(), DispatchError>;
}

/// The worker controller owning the concurrency semaphore.
pub trait Controller: Send + Sync {
    /// Releases every waiter on the concurrency semaphore.
    fn clear_semaphore(&self);
}

/// Optional long-lived agent co-located with the worker.
///
/// Instantiated by the Agent bootstep when a factory is configured.
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    /// Brings the agent up; runs once per blueprint start.
    async fn start(&self) -> Result<(), ConsumerError>;

    /// Tears the agent down; must be idempotent.
    async fn stop(&self);
}

/// Builds a [`WorkerAgent`] bound to the broker connection.
pub type AgentFactory = Arc<
    dyn Fn(Arc<dyn crate::runtime::Connection>) -> Arc<dyn WorkerAgent> + Send + Sync,
>;
