//! Unified error types for the RepoPulse API
//!
//! This module defines error types for each layer:
//! - `IngestError`: per-event input errors (never halt the pipeline)
//! - `TransportError`: a single connection's write half failed
//! - `HubError`: broadcast hub registry / encoding errors
//! - `UpstreamError`: failures reported by external collaborators
//! - `ConfigError`: invalid configuration values
//! - `AppError`: HTTP layer errors (wraps the above for responses)

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::entities::{ClientId, EventId};

/// Input errors - a malformed or out-of-order event, rejected on its own
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IngestError {
    #[error("Invalid repository key: {0}")]
    InvalidRepoKey(String),

    #[error("Event {event_id} for {repo} is out of order: {occurred_at} precedes {last_event_time} beyond tolerance")]
    OutOfOrder {
        event_id: EventId,
        repo: String,
        occurred_at: DateTime<Utc>,
        last_event_time: DateTime<Utc>,
    },

    #[error("Event {event_id} for {repo} is timestamped in the future: {occurred_at}")]
    FromFuture {
        event_id: EventId,
        repo: String,
        occurred_at: DateTime<Utc>,
    },

    #[error("Event {event_id} for {repo} is older than the activity window")]
    Stale { event_id: EventId, repo: String },

    #[error("Duplicate event: {0}")]
    Duplicate(EventId),

    #[error("Event intake queue is full")]
    IntakeFull,

    #[error("Event intake queue is closed")]
    IntakeClosed,
}

impl IngestError {
    /// Short machine-readable reason, used in ingestion responses
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidRepoKey(_) => "invalid_repo_key",
            IngestError::OutOfOrder { .. } => "out_of_order",
            IngestError::FromFuture { .. } => "from_future",
            IngestError::Stale { .. } => "stale",
            IngestError::Duplicate(_) => "duplicate",
            IngestError::IntakeFull => "intake_full",
            IngestError::IntakeClosed => "intake_closed",
        }
    }
}

/// Transport errors - writing to one subscriber failed
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed by peer")]
    Closed,

    #[error("Write failed: {0}")]
    Write(String),
}

/// Broadcast hub errors
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Connection registry is full ({capacity} connections)")]
    RegistryFull { capacity: usize },

    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure reported by an external collaborator (query subsystem, event source)
#[derive(Debug, Clone, Error)]
#[error("{service} error ({code}): {message}")]
pub struct UpstreamError {
    pub service: &'static str,
    pub code: String,
    pub message: String,
    /// Suggested client retry delay
    pub retry_after_secs: Option<u64>,
}

impl UpstreamError {
    pub fn new(service: &'static str, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service,
            code: code.into(),
            message: message.into(),
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid value: {value:?}")]
    Parse { key: &'static str, value: String },

    #[error("{key} is out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },
}

/// Application layer errors - used by HTTP handlers
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body for JSON responses
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Ingest(IngestError::IntakeFull) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Intake queue full",
                None,
            ),
            AppError::Ingest(IngestError::IntakeClosed) => {
                tracing::error!("Ingestion attempted after intake closed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Pipeline unavailable",
                    None,
                )
            }
            AppError::Ingest(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Event rejected",
                Some(e.to_string()),
            ),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable",
                Some(msg.clone()),
            ),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            details,
        });

        (status, body).into_response()
    }
}
