//! Wire messages exchanged with live subscribers
//!
//! Every outbound frame is a JSON object with a `type` discriminator and an
//! ISO-8601 `timestamp` (microsecond precision). Encoding goes through the
//! single exhaustive `ServerMessage` enum; inbound frames decode into
//! `ClientMessage`, where anything but `ping` maps to `Other`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{ChangeKind, EventKind, Momentum, RankEntry, RepoKey, SnapshotId, TrendStatus};

/// Severity attached to status and error notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Server-to-client notification
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection {
        status: String,
        client_id: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot_id: Option<SnapshotId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rankings: Option<Vec<RankEntry>>,
    },
    Heartbeat,
    NewEvent {
        event_id: String,
        repo_full_name: RepoKey,
        event_type: EventKind,
        title: String,
        author: String,
        url: String,
        data: serde_json::Value,
    },
    SummaryUpdate {
        repo_full_name: RepoKey,
        summary: String,
        activity_score: f64,
        trend_status: TrendStatus,
        momentum: Momentum,
        events_in_window: usize,
    },
    RankingChange {
        repo_full_name: RepoKey,
        old_rank: Option<u32>,
        new_rank: Option<u32>,
        activity_score: f64,
        change: ChangeKind,
    },
    TrendChange {
        repo_full_name: RepoKey,
        old_status: TrendStatus,
        new_status: TrendStatus,
        momentum: Momentum,
        velocity: f64,
        activity_score: f64,
    },
    MetricsUpdate {
        total_events: u64,
        active_repositories: u64,
        total_queries: u64,
        websocket_connections: u64,
        /// Delta per counter since the previous published snapshot
        changes: BTreeMap<String, i64>,
    },
    SystemStatus {
        status: String,
        components: BTreeMap<String, String>,
        message: String,
        severity: Severity,
    },
    Error {
        error_code: String,
        message: String,
        severity: Severity,
        details: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        retry_after_secs: Option<u64>,
    },
    Pong,
}

impl ServerMessage {
    /// Wire discriminator, handy for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connection { .. } => "connection",
            ServerMessage::Heartbeat => "heartbeat",
            ServerMessage::NewEvent { .. } => "new_event",
            ServerMessage::SummaryUpdate { .. } => "summary_update",
            ServerMessage::RankingChange { .. } => "ranking_change",
            ServerMessage::TrendChange { .. } => "trend_change",
            ServerMessage::MetricsUpdate { .. } => "metrics_update",
            ServerMessage::SystemStatus { .. } => "system_status",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Pong => "pong",
        }
    }

    /// Encode as a JSON text frame stamped with `at`
    pub fn encode_at(&self, at: DateTime<Utc>) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }
        serde_json::to_string(&value)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        self.encode_at(Utc::now())
    }
}

/// Client-to-server frame. Only `ping` is honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    #[serde(other)]
    Other,
}

impl ClientMessage {
    /// Decode a text frame; undecodable input is treated as `Other`
    pub fn decode(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or(ClientMessage::Other)
    }
}
