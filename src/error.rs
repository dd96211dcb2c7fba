//! Error types used by the consumer control plane.
//!
//! This module defines the error taxonomy of the crate:
//!
//! - [`ConnectionError`] — failures raised by the broker connection collaborator.
//! - [`ConsumerError`] — errors surfaced by the consumer loop and bootsteps.
//! - [`RestartFrequencyExceeded`] — signal raised by the restart-frequency limiter.
//! - [`DispatchError`] — failure of a fire-and-forget task invocation.
//!
//! The taxonomy mirrors how errors are *handled*, not where they originate:
//! resource exhaustion is fatal and propagated unmodified, transport errors are
//! retried with backoff, and everything in the gossip plane is logged and
//! swallowed. Helper methods (`as_label`, `is_fatal`) exist for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the broker connection collaborator.
///
/// Transport failures are retryable; resource exhaustion (e.g. the process ran
/// out of file descriptors while opening a channel) is not.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// Transport-level failure (socket reset, broker unreachable, protocol error).
    #[error("broker transport failure: {0}")]
    Transport(String),

    /// The inbound event stream was closed under us.
    #[error("connection closed")]
    Closed,

    /// Resource-exhaustion class of failure (EMFILE/ENFILE and friends).
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

impl ConnectionError {
    /// Classifies a raw I/O error: fd-exhaustion becomes
    /// [`ConnectionError::ResourceExhausted`], everything else is transport.
    pub fn from_io(err: &std::io::Error) -> Self {
        // EMFILE = 24, ENFILE = 23 on Linux; ErrorKind does not cover both,
        // so the raw errno is checked as well.
        let exhausted = matches!(err.raw_os_error(), Some(23) | Some(24))
            || err.kind() == std::io::ErrorKind::OutOfMemory;
        if exhausted {
            ConnectionError::ResourceExhausted(err.to_string())
        } else {
            ConnectionError::Transport(err.to_string())
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionError::Transport(_) => "connection_transport",
            ConnectionError::Closed => "connection_closed",
            ConnectionError::ResourceExhausted(_) => "connection_resource_exhausted",
        }
    }
}

/// Errors surfaced by the consumer loop and its bootsteps.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// A failure of the broker connection; retried by the consumer loop.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A bootstep could not be brought up for a non-transport reason.
    #[error("bootstep {step} failed: {reason}")]
    Bootstep {
        /// Name of the failing step.
        step: &'static str,
        /// What went wrong.
        reason: String,
    },
}

impl ConsumerError {
    /// True when the error must terminate the worker instead of being retried.
    ///
    /// Only the resource-exhaustion class is fatal; everything else is either
    /// retried by the consumer loop or logged and swallowed at the call site.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsumerError::Connection(ConnectionError::ResourceExhausted(_))
        )
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConsumerError::Connection(c) => c.as_label(),
            ConsumerError::Bootstep { .. } => "bootstep_failed",
        }
    }
}

/// Raised by [`RestartState`](crate::RestartState) when connection restarts
/// happen more often than the configured maximum allows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("restart frequency exceeded: {restarts} restarts within {window:?}")]
pub struct RestartFrequencyExceeded {
    /// Restarts observed inside the window when the limit tripped.
    pub restarts: usize,
    /// The configured trailing window.
    pub window: Duration,
}

/// Failure of a fire-and-forget task invocation made through the pool.
///
/// Never propagated: the gossip layer catches it and logs.
#[derive(Error, Debug, Clone)]
#[error("task dispatch failed: {0}")]
pub struct DispatchError(pub String);
