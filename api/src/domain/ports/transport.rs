//! Subscriber transport port trait
//!
//! The broadcast hub is transport-agnostic: any reliable, ordered,
//! message-framed write half can carry notifications.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::entities::DisconnectReason;
use crate::error::TransportError;

#[async_trait]
pub trait MessageSink: Send + 'static {
    /// Write one encoded text frame. May wait on the transport.
    async fn send(&mut self, frame: Arc<str>) -> Result<(), TransportError>;

    /// Best-effort close of the underlying transport
    async fn close(&mut self, reason: DisconnectReason);
}
