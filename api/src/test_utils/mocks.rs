//! Mock implementations of port traits
//!
//! In-memory transports, sources and stats providers. Each sink comes with
//! a `SinkProbe` the test keeps to inspect what the hub delivered.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::entities::{DisconnectReason, Event};
use crate::domain::ports::{EventSource, MessageSink, QueryStatsProvider};
use crate::error::{TransportError, UpstreamError};

// ============================================================================
// Sinks
// ============================================================================

/// Observes one mock sink from the test side
pub struct SinkProbe {
    frames: mpsc::UnboundedReceiver<Arc<str>>,
    closed: Arc<Mutex<Option<DisconnectReason>>>,
}

impl SinkProbe {
    /// Drain every frame delivered so far, decoded as JSON
    pub fn frames(&mut self) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            out.push(serde_json::from_str(&frame).expect("hub frames are JSON"));
        }
        out
    }

    /// Reason passed to `close`, if the hub closed the sink
    pub fn closed_reason(&self) -> Option<DisconnectReason> {
        *self.closed.lock().unwrap()
    }
}

fn probe_pair() -> (
    mpsc::UnboundedSender<Arc<str>>,
    Arc<Mutex<Option<DisconnectReason>>>,
    SinkProbe,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let closed = Arc::new(Mutex::new(None));
    let probe = SinkProbe {
        frames: rx,
        closed: Arc::clone(&closed),
    };
    (tx, closed, probe)
}

/// Delivers every frame to its probe
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Arc<str>>,
    closed: Arc<Mutex<Option<DisconnectReason>>>,
}

impl ChannelSink {
    pub fn new() -> (Self, SinkProbe) {
        let (tx, closed, probe) = probe_pair();
        (Self { tx, closed }, probe)
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn send(&mut self, frame: Arc<str>) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self, reason: DisconnectReason) {
        *self.closed.lock().unwrap() = Some(reason);
    }
}

/// Never completes a write, like a peer that stopped reading
pub struct StalledSink {
    closed: Arc<Mutex<Option<DisconnectReason>>>,
}

impl StalledSink {
    pub fn new() -> (Self, SinkProbe) {
        let (_tx, closed, probe) = probe_pair();
        (Self { closed }, probe)
    }
}

#[async_trait]
impl MessageSink for StalledSink {
    async fn send(&mut self, _frame: Arc<str>) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn close(&mut self, reason: DisconnectReason) {
        *self.closed.lock().unwrap() = Some(reason);
    }
}

/// Fails every write
pub struct FailingSink {
    closed: Arc<Mutex<Option<DisconnectReason>>>,
}

impl FailingSink {
    pub fn new() -> (Self, SinkProbe) {
        let (_tx, closed, probe) = probe_pair();
        (Self { closed }, probe)
    }
}

#[async_trait]
impl MessageSink for FailingSink {
    async fn send(&mut self, _frame: Arc<str>) -> Result<(), TransportError> {
        Err(TransportError::Write("connection reset".to_string()))
    }

    async fn close(&mut self, reason: DisconnectReason) {
        *self.closed.lock().unwrap() = Some(reason);
    }
}

/// Blocks in both `send` and `close`, like a socket whose peer vanished
/// with a full buffer. The returned flag is set once the sink is dropped.
pub struct BlockedSink {
    released: Arc<AtomicBool>,
}

impl BlockedSink {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        (
            Self {
                released: Arc::clone(&released),
            },
            released,
        )
    }
}

impl Drop for BlockedSink {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageSink for BlockedSink {
    async fn send(&mut self, _frame: Arc<str>) -> Result<(), TransportError> {
        std::future::pending().await
    }

    async fn close(&mut self, _reason: DisconnectReason) {
        std::future::pending::<()>().await
    }
}

// ============================================================================
// Event Source
// ============================================================================

/// Replays a fixed script of batches and failures, then reports exhaustion
pub struct ScriptedSource {
    script: VecDeque<Result<Vec<Event>, UpstreamError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Event>, UpstreamError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<Event>>, UpstreamError> {
        match self.script.pop_front() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Query Stats
// ============================================================================

/// Reports a settable query count
pub struct FixedQueryStats {
    total: AtomicU64,
}

impl FixedQueryStats {
    pub fn new(total: u64) -> Self {
        Self {
            total: AtomicU64::new(total),
        }
    }

    pub fn set(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }
}

#[async_trait]
impl QueryStatsProvider for FixedQueryStats {
    async fn total_queries(&self) -> Result<u64, UpstreamError> {
        Ok(self.total.load(Ordering::Relaxed))
    }
}

/// Always unavailable, suggesting a 15 second retry
#[derive(Default)]
pub struct FailingQueryStats;

#[async_trait]
impl QueryStatsProvider for FailingQueryStats {
    async fn total_queries(&self) -> Result<u64, UpstreamError> {
        Err(UpstreamError::new("query", "unavailable", "query service unreachable").with_retry_after(15))
    }
}
