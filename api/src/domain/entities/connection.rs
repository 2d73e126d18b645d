//! Subscriber connection domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier assigned to a subscriber at accept time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client_{}", self.0.simple())
    }
}

/// Lifecycle of a subscriber connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Open => write!(f, "OPEN"),
            ConnectionState::Closing => write!(f, "CLOSING"),
            ConnectionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Why the hub closed a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The peer closed the socket
    ClientClosed,
    /// A write to the transport failed
    TransportError,
    /// The per-connection send queue overflowed
    QueueOverflow,
    /// No inbound traffic within the liveness window
    LivenessTimeout,
    /// The registry was full at accept time
    CapacityExceeded,
    /// The server is shutting down
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ClientClosed => write!(f, "client_closed"),
            DisconnectReason::TransportError => write!(f, "transport_error"),
            DisconnectReason::QueueOverflow => write!(f, "queue_overflow"),
            DisconnectReason::LivenessTimeout => write!(f, "liveness_timeout"),
            DisconnectReason::CapacityExceeded => write!(f, "capacity_exceeded"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}
