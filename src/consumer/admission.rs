//! Task admission control: per-task-type rate-limit buckets.

use std::collections::HashMap;
use std::sync::Arc;

use crate::runtime::TokenBucket;

/// A task request awaiting admission.
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Unique id of this invocation.
    pub id: String,
    /// Registered task-type name; selects the bucket.
    pub task_type: String,
}

impl TaskRequest {
    /// Builds a request.
    pub fn new(id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
        }
    }
}

/// Admission verdict source for one task type.
#[derive(Clone)]
pub enum TaskBucket {
    /// No limiting configured: admit everything immediately.
    Unlimited,
    /// Consult the bucket before admitting.
    Limited(Arc<dyn TokenBucket>),
}

/// Mapping from task-type name to its rate-limit bucket.
///
/// A type with no entry resolves to [`TaskBucket::Unlimited`] — unknown task
/// types mean "no limiting configured", never an error.
#[derive(Clone, Default)]
pub struct TaskBucketTable {
    buckets: HashMap<String, Arc<dyn TokenBucket>>,
}

impl TaskBucketTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) the bucket for a task type.
    pub fn insert(&mut self, task_type: impl Into<String>, bucket: Arc<dyn TokenBucket>) {
        self.buckets.insert(task_type.into(), bucket);
    }

    /// Removes the bucket for a task type, making it unrestricted again.
    pub fn remove(&mut self, task_type: &str) {
        self.buckets.remove(task_type);
    }

    /// Resolves the bucket for a task type.
    pub fn bucket_for(&self, task_type: &str) -> TaskBucket {
        match self.buckets.get(task_type) {
            Some(bucket) => TaskBucket::Limited(bucket.clone()),
            None => TaskBucket::Unlimited,
        }
    }
}
