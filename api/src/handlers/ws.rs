//! Live updates WebSocket handler
//!
//! Registers each upgraded socket with the broadcast hub and keeps reading
//! from it so the hub sees liveness traffic and pings. The read half is
//! released as soon as the hub drops the connection.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::StreamExt;

use crate::adapters::WsSink;
use crate::app::BroadcastHub;
use crate::domain::entities::DisconnectReason;
use crate::AppState;

/// GET /ws/live-updates
pub async fn live_updates(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state.hub))
}

async fn serve_subscriber(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (tx, mut rx) = socket.split();

    let (client_id, mut disconnected) = match hub.accept_watched(WsSink::new(tx)) {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::debug!(error = %e, "Subscriber not registered");
            return;
        }
    };

    let reason = loop {
        let frame = tokio::select! {
            reason = disconnected.wait() => {
                tracing::debug!(client_id = %client_id, reason = %reason, "Subscriber dropped by hub");
                return;
            }
            frame = rx.next() => frame,
        };
        match frame {
            Some(Ok(Message::Text(text))) => hub.handle_inbound(client_id, &text),
            Some(Ok(Message::Close(_))) | None => break DisconnectReason::ClientClosed,
            Some(Ok(_)) => hub.touch(client_id),
            Some(Err(e)) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket read failed");
                break DisconnectReason::TransportError;
            }
        }
    };

    hub.disconnect(client_id, reason);
}
