//! CDP (Chrome DevTools Protocol) layer traits
//!
//! This module defines the abstract transport the page driver talks through.

use async_trait::async_trait;
use serde_json::Value;

/// CDP event representation
#[derive(Debug, Clone)]
pub struct CdpEvent {
    /// Event method (e.g., "Page.loadEventFired")
    pub method: String,
    /// Event parameters
    pub params: Value,
    /// Session the event was emitted on (`None` for browser-level events)
    pub session_id: Option<String>,
}

/// CDP transport
///
/// Correlates a command with its reply over some duplex channel. Events read
/// from the channel are published to the browser-wide
/// [`EventBus`](super::bus::EventBus) the transport was built with.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send a command, optionally addressed to a flattened session, and
    /// return its `result` member. A protocol-level error reply becomes
    /// [`Error::Cdp`](crate::Error::Cdp).
    async fn call(
        &self,
        session_id: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, crate::Error>;

    /// Close the transport
    async fn close(&self) -> Result<(), crate::Error>;

    /// Check if the transport is still usable
    fn is_active(&self) -> bool;
}
