//! Broadcast hub
//!
//! Owns every subscriber connection. The registry is a mutex-guarded map
//! that is never held across an await; each connection has a bounded
//! send queue drained by its own writer task, so a slow transport only
//! ever fills its own queue. A full queue evicts that one connection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};

use crate::domain::entities::{
    ClientId, ClientMessage, ConnectionState, DisconnectReason, ServerMessage, Severity,
};
use crate::domain::ports::{MessageSink, SnapshotProvider};
use crate::error::HubError;

/// How long a closing writer keeps flushing already-queued frames on shutdown
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(1);

/// Upper bound on closing a transport; a peer that stopped reading is dropped after this
const TRANSPORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Frames a connection may have queued before it is evicted
    pub send_queue_capacity: usize,
    pub max_connections: usize,
    pub heartbeat_interval: Duration,
    /// Silence longer than `heartbeat_interval * liveness_multiplier` disconnects.
    /// Idle connections are reaped every `reap_interval()`, so a silent client
    /// is closed at most one reap interval after its timeout expires.
    pub liveness_multiplier: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            max_connections: 10_000,
            heartbeat_interval: Duration::from_secs(30),
            liveness_multiplier: 2,
        }
    }
}

impl HubConfig {
    pub fn liveness_timeout(&self) -> Duration {
        self.heartbeat_interval
            .checked_mul(self.liveness_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Cadence of the idle reaper: a quarter heartbeat, at least one second,
    /// never slower than the heartbeat itself
    pub fn reap_interval(&self) -> Duration {
        (self.heartbeat_interval / 4)
            .max(Duration::from_secs(1))
            .min(self.heartbeat_interval)
    }
}

/// Resolves once the hub has dropped a connection, whatever the cause
pub struct Disconnected(watch::Receiver<Option<DisconnectReason>>);

impl Disconnected {
    pub async fn wait(&mut self) -> DisconnectReason {
        match self.0.wait_for(Option::is_some).await {
            Ok(reason) => {
                let reason = *reason;
                reason.unwrap_or(DisconnectReason::Shutdown)
            }
            Err(_) => DisconnectReason::Shutdown,
        }
    }
}

struct ClientEntry {
    queue: mpsc::Sender<Arc<str>>,
    close: Option<oneshot::Sender<DisconnectReason>>,
    disconnected: watch::Sender<Option<DisconnectReason>>,
    state: ConnectionState,
    connected_at: DateTime<Utc>,
    last_seen: Instant,
    messages_sent: Arc<AtomicU64>,
}

#[derive(Default)]
struct Shared {
    clients: Mutex<HashMap<ClientId, ClientEntry>>,
    total_messages_sent: AtomicU64,
}

impl Shared {
    fn clients(&self) -> MutexGuard<'_, HashMap<ClientId, ClientEntry>> {
        match self.clients.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Remove a client and signal its writer. Returns false if it was already gone.
    fn remove(&self, client_id: ClientId, reason: DisconnectReason) -> bool {
        let (removed, remaining) = {
            let mut clients = self.clients();
            let removed = clients.remove(&client_id);
            (removed, clients.len())
        };
        let Some(mut entry) = removed else {
            return false;
        };

        if let Some(close) = entry.close.take() {
            let _ = close.send(reason);
        }
        entry.disconnected.send_replace(Some(reason));
        tracing::info!(
            client_id = %client_id,
            reason = %reason,
            open_connections = remaining,
            "Client disconnected"
        );
        true
    }
}

/// Per-connection statistics
#[derive(Debug, Clone, Serialize)]
pub struct ClientStats {
    pub client_id: String,
    pub state: ConnectionState,
    pub connected_at: DateTime<Utc>,
    pub messages_sent: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubStats {
    pub open_connections: usize,
    pub total_messages_sent: u64,
    pub clients: Vec<ClientStats>,
}

pub struct BroadcastHub {
    config: HubConfig,
    shared: Arc<Shared>,
    snapshots: Arc<dyn SnapshotProvider>,
}

impl BroadcastHub {
    pub fn new(config: HubConfig, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        Self {
            config,
            shared: Arc::new(Shared::default()),
            snapshots,
        }
    }

    /// Register a transport, spawn its writer and queue the connection
    /// confirmation (with the current ranking snapshot) as its first frame.
    ///
    /// When the registry is full the transport receives a
    /// `capacity_exceeded` error and is closed.
    pub fn accept<S>(&self, sink: S) -> Result<ClientId, HubError>
    where
        S: MessageSink,
    {
        self.accept_watched(sink).map(|(client_id, _)| client_id)
    }

    /// Like `accept`, also handing back a signal that fires when the hub
    /// disconnects the client (eviction, liveness timeout, shutdown)
    pub fn accept_watched<S>(&self, sink: S) -> Result<(ClientId, Disconnected), HubError>
    where
        S: MessageSink,
    {
        let client_id = ClientId::new();
        let snapshot = self.snapshots.current_snapshot();
        let confirmation = ServerMessage::Connection {
            status: "connected".to_string(),
            client_id: client_id.to_string(),
            message: "Connected to live activity updates".to_string(),
            snapshot_id: snapshot.as_ref().map(|s| s.snapshot_id),
            rankings: snapshot.map(|s| s.entries.clone()),
        };
        let frame: Arc<str> = confirmation.encode()?.into();

        let (queue, rx) = mpsc::channel(self.config.send_queue_capacity.max(1));
        let (close, close_rx) = oneshot::channel();
        let (disconnected, disconnected_rx) = watch::channel(None);
        let messages_sent = Arc::new(AtomicU64::new(0));

        let open = {
            let mut clients = self.shared.clients();
            if clients.len() >= self.config.max_connections {
                None
            } else {
                let mut entry = ClientEntry {
                    queue,
                    close: Some(close),
                    disconnected,
                    state: ConnectionState::Connecting,
                    connected_at: Utc::now(),
                    last_seen: Instant::now(),
                    messages_sent: Arc::clone(&messages_sent),
                };
                // capacity is at least 1 and the queue is fresh
                let _ = entry.queue.try_send(frame);
                entry.state = ConnectionState::Open;
                clients.insert(client_id, entry);
                Some(clients.len())
            }
        };

        let Some(open_connections) = open else {
            let capacity = self.config.max_connections;
            tracing::warn!(capacity, "Connection registry full, rejecting client");
            tokio::spawn(reject(sink, capacity, self.config.heartbeat_interval));
            return Err(HubError::RegistryFull { capacity });
        };

        tokio::spawn(run_writer(
            client_id,
            sink,
            rx,
            close_rx,
            Arc::clone(&self.shared),
            messages_sent,
        ));

        tracing::info!(client_id = %client_id, open_connections, "Client connected");
        Ok((client_id, Disconnected(disconnected_rx)))
    }

    /// Queue a message for every open connection. Never waits; a connection
    /// whose queue is full is evicted. Returns the number of connections
    /// the message was queued for.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let frame: Arc<str> = match message.encode() {
            Ok(text) => text.into(),
            Err(e) => {
                tracing::error!(kind = message.kind(), error = %e, "Failed to encode broadcast");
                return 0;
            }
        };

        let mut evicted = Vec::new();
        let mut delivered = 0;
        {
            let clients = self.shared.clients();
            for (client_id, entry) in clients.iter() {
                if entry.state != ConnectionState::Open {
                    continue;
                }
                match entry.queue.try_send(Arc::clone(&frame)) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        evicted.push((*client_id, DisconnectReason::QueueOverflow))
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        evicted.push((*client_id, DisconnectReason::TransportError))
                    }
                }
            }
        }

        for (client_id, reason) in evicted {
            if reason == DisconnectReason::QueueOverflow {
                tracing::warn!(client_id = %client_id, "Send queue full, evicting slow client");
            }
            self.shared.remove(client_id, reason);
        }

        tracing::debug!(kind = message.kind(), delivered, "Broadcast queued");
        delivered
    }

    /// Queue a message for a single connection
    pub fn send_to(&self, client_id: ClientId, message: &ServerMessage) -> Result<(), HubError> {
        let frame: Arc<str> = message.encode()?.into();
        let result = {
            let clients = self.shared.clients();
            let entry = clients
                .get(&client_id)
                .filter(|e| e.state == ConnectionState::Open)
                .ok_or(HubError::UnknownClient(client_id))?;
            entry.queue.try_send(frame)
        };

        match result {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(client_id = %client_id, "Send queue full, evicting slow client");
                self.shared.remove(client_id, DisconnectReason::QueueOverflow);
                Err(HubError::UnknownClient(client_id))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.shared.remove(client_id, DisconnectReason::TransportError);
                Err(HubError::UnknownClient(client_id))
            }
        }
    }

    /// Record inbound traffic for liveness
    pub fn touch(&self, client_id: ClientId) {
        if let Some(entry) = self.shared.clients().get_mut(&client_id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Handle an inbound text frame. Any frame counts as liveness traffic;
    /// `ping` is answered with `pong` to that client alone, everything else
    /// is ignored.
    pub fn handle_inbound(&self, client_id: ClientId, text: &str) {
        self.touch(client_id);
        match ClientMessage::decode(text) {
            ClientMessage::Ping => {
                if let Err(e) = self.send_to(client_id, &ServerMessage::Pong) {
                    tracing::debug!(client_id = %client_id, error = %e, "Pong not delivered");
                }
            }
            ClientMessage::Other => {}
        }
    }

    /// Close a connection and release its queue. A second call for the same
    /// client is a no-op and returns false.
    pub fn disconnect(&self, client_id: ClientId, reason: DisconnectReason) -> bool {
        self.shared.remove(client_id, reason)
    }

    /// Queue a heartbeat for every open connection, then reap silent ones
    pub fn heartbeat_tick(&self) -> usize {
        let delivered = self.broadcast(&ServerMessage::Heartbeat);
        self.reap_idle(Instant::now());
        delivered
    }

    /// Disconnect every connection with no inbound traffic within the
    /// liveness timeout, judged at `now`. Returns the reaped ids.
    pub fn reap_idle(&self, now: Instant) -> Vec<ClientId> {
        let timeout = self.config.liveness_timeout();
        let idle: Vec<ClientId> = self
            .shared
            .clients()
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.last_seen) > timeout)
            .map(|(id, _)| *id)
            .collect();

        for client_id in &idle {
            tracing::info!(client_id = %client_id, "Liveness timeout");
            self.shared.remove(*client_id, DisconnectReason::LivenessTimeout);
        }
        idle
    }

    /// Heartbeat and idle-reaper loop; runs until the task is dropped
    pub async fn run_heartbeat(self: Arc<Self>) {
        let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut reaper = tokio::time::interval(self.config.reap_interval());
        reaper.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        heartbeat.tick().await;
        reaper.tick().await;
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let delivered = self.heartbeat_tick();
                    tracing::debug!(delivered, "Heartbeat sent");
                }
                _ = reaper.tick() => {
                    self.reap_idle(Instant::now());
                }
            }
        }
    }

    /// Tell every client the service is stopping, then close all connections.
    /// Writers flush what is already queued before closing.
    pub fn shutdown(&self, severity: Severity, message: &str) {
        let components = BTreeMap::from([
            ("pipeline".to_string(), "stopped".to_string()),
            ("broadcast_hub".to_string(), "stopping".to_string()),
        ]);
        self.broadcast(&ServerMessage::SystemStatus {
            status: "shutting_down".to_string(),
            components,
            message: message.to_string(),
            severity,
        });

        let ids: Vec<ClientId> = self.shared.clients().keys().copied().collect();
        for client_id in ids {
            self.shared.remove(client_id, DisconnectReason::Shutdown);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.shared.clients().len()
    }

    /// Current state of a connection; CLOSED once it has left the registry
    pub fn connection_state(&self, client_id: ClientId) -> ConnectionState {
        self.shared
            .clients()
            .get(&client_id)
            .map(|e| e.state)
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn stats(&self) -> HubStats {
        let clients = self.shared.clients();
        let mut per_client: Vec<ClientStats> = clients
            .iter()
            .map(|(id, e)| ClientStats {
                client_id: id.to_string(),
                state: e.state,
                connected_at: e.connected_at,
                messages_sent: e.messages_sent.load(Ordering::Relaxed),
            })
            .collect();
        per_client.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));

        HubStats {
            open_connections: clients.len(),
            total_messages_sent: self.shared.total_messages_sent.load(Ordering::Relaxed),
            clients: per_client,
        }
    }
}

/// Drain one connection's queue into its transport
async fn run_writer<S>(
    client_id: ClientId,
    mut sink: S,
    mut rx: mpsc::Receiver<Arc<str>>,
    mut close_rx: oneshot::Receiver<DisconnectReason>,
    shared: Arc<Shared>,
    messages_sent: Arc<AtomicU64>,
) where
    S: MessageSink,
{
    let reason = loop {
        let frame = tokio::select! {
            biased;
            signal = &mut close_rx => break signal.unwrap_or(DisconnectReason::Shutdown),
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break DisconnectReason::Shutdown,
            },
        };

        let result = tokio::select! {
            biased;
            signal = &mut close_rx => break signal.unwrap_or(DisconnectReason::Shutdown),
            result = sink.send(frame) => result,
        };

        match result {
            Ok(()) => {
                messages_sent.fetch_add(1, Ordering::Relaxed);
                shared.total_messages_sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "Transport write failed");
                shared.remove(client_id, DisconnectReason::TransportError);
                break DisconnectReason::TransportError;
            }
        }
    };

    if reason == DisconnectReason::Shutdown {
        let flush = async {
            while let Ok(frame) = rx.try_recv() {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(SHUTDOWN_DRAIN, flush).await;
    }

    if tokio::time::timeout(TRANSPORT_CLOSE_TIMEOUT, sink.close(reason))
        .await
        .is_err()
    {
        tracing::debug!(client_id = %client_id, reason = %reason, "Transport close timed out");
    }
    drop(sink);
}

/// Tell an over-capacity transport why it is being turned away
async fn reject<S>(mut sink: S, capacity: usize, retry_after: Duration)
where
    S: MessageSink,
{
    let message = ServerMessage::Error {
        error_code: "capacity_exceeded".to_string(),
        message: "Server is at connection capacity".to_string(),
        severity: Severity::Warning,
        details: serde_json::json!({ "max_connections": capacity }),
        retry_after_secs: Some(retry_after.as_secs().max(1)),
    };
    let turn_away = async {
        if let Ok(text) = message.encode() {
            let _ = sink.send(text.into()).await;
        }
        sink.close(DisconnectReason::CapacityExceeded).await;
    };
    if tokio::time::timeout(TRANSPORT_CLOSE_TIMEOUT, turn_away).await.is_err() {
        tracing::debug!("Over-capacity transport did not close in time");
    }
}
