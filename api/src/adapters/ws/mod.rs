//! WebSocket adapter
//!
//! Write half of an axum WebSocket as a hub transport.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;

use crate::domain::entities::DisconnectReason;
use crate::domain::ports::MessageSink;
use crate::error::TransportError;

pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

impl WsSink {
    pub fn new(inner: SplitSink<WebSocket, Message>) -> Self {
        Self { inner }
    }
}

/// Close code sent to the peer for each disconnect reason
pub fn close_code_for(reason: DisconnectReason) -> u16 {
    match reason {
        DisconnectReason::ClientClosed => close_code::NORMAL,
        DisconnectReason::TransportError => close_code::ERROR,
        DisconnectReason::QueueOverflow => close_code::POLICY,
        DisconnectReason::LivenessTimeout => close_code::AWAY,
        DisconnectReason::CapacityExceeded => close_code::AGAIN,
        DisconnectReason::Shutdown => close_code::RESTART,
    }
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, frame: Arc<str>) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(frame.to_string()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, reason: DisconnectReason) {
        let frame = CloseFrame {
            code: close_code_for(reason),
            reason: Cow::Owned(reason.to_string()),
        };
        if let Err(e) = self.inner.send(Message::Close(Some(frame))).await {
            tracing::debug!(reason = %reason, error = %e, "Close frame not delivered");
        }
        let _ = self.inner.close().await;
    }
}
