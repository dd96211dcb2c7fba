//! Startup handshake transport (`hello`) contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One peer's answer to the startup `hello` broadcast.
///
/// A healthy peer answers with its logical clock and revoked-task snapshot; a
/// peer that could not serve the request answers with `error` instead. The
/// fields are optional because the reply crosses a wire: receivers key off
/// presence, never off a default value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelloReply {
    /// The peer's logical-clock value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clock: Option<u64>,
    /// Task ids the peer knows to be revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<Vec<String>>,
    /// Set when the peer failed to answer; such replies are skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HelloReply {
    /// A well-formed reply.
    pub fn ok(clock: u64, revoked: Vec<String>) -> Self {
        Self {
            clock: Some(clock),
            revoked: Some(revoked),
            error: None,
        }
    }

    /// An error reply.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            clock: None,
            revoked: None,
            error: Some(message.into()),
        }
    }
}

/// Injected handshake transport used by the Mingle bootstep.
#[async_trait]
pub trait Inspect: Send + Sync {
    /// Queries every currently reachable peer.
    ///
    /// An empty map is a valid outcome: the worker is alone.
    async fn hello(&self) -> HashMap<String, HelloReply>;
}
