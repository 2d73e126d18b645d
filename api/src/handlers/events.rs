//! Event ingestion handler
//!
//! Push-style producers submit canonical events here. Each accepted event
//! goes straight into the intake queue; the pipeline does the rest.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::domain::entities::{Event, RepoKey};
use crate::error::{AppError, IngestError};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "X-Signature-256";

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectedEvent {
    pub event_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub accepted: usize,
    pub rejected: Vec<RejectedEvent>,
}

/// Verify an HMAC-SHA256 body signature sent as `sha256=<hex>`
pub(crate) fn verify_signature(
    payload: &[u8],
    signature: Option<&str>,
    secret: &Option<String>,
) -> bool {
    let Some(secret) = secret else {
        tracing::warn!("Ingestion secret not configured, skipping signature verification");
        return true;
    };

    let Some(sig_header) = signature else {
        tracing::warn!("No signature provided in ingestion request");
        return false;
    };

    let expected_hex = sig_header.strip_prefix("sha256=").unwrap_or(sig_header);

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => {
            tracing::error!("Invalid ingestion secret key");
            return false;
        }
    };

    mac.update(payload);

    let expected_bytes = match hex::decode(expected_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Invalid signature format");
            return false;
        }
    };

    mac.verify_slice(&expected_bytes).is_ok()
}

/// Decode one event, reporting a malformed repository key by its own code
fn parse_event(item: Value) -> Result<Event, String> {
    let raw_key = item
        .get("repo_key")
        .or_else(|| item.get("repo_full_name"))
        .and_then(Value::as_str);
    if let Some(raw) = raw_key {
        if let Err(e) = RepoKey::parse(raw) {
            return Err(e.code().to_string());
        }
    }
    serde_json::from_value(item).map_err(|e| {
        tracing::debug!(error = %e, "Event failed to decode");
        "invalid_event".to_string()
    })
}

/// POST /events
///
/// Accepts one event object or an array of them.
pub async fn ingest_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if !verify_signature(&body, signature, &state.config.webhook_secret) {
        tracing::warn!("Ingestion signature verification failed");
        return Err(AppError::Unauthorized);
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {}", e)))?;
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(_) => vec![payload],
        _ => {
            return Err(AppError::BadRequest(
                "Expected an event object or an array of events".to_string(),
            ))
        }
    };

    let mut accepted = 0;
    let mut rejected = Vec::new();
    for item in items {
        let event_id = item
            .get("event_id")
            .and_then(Value::as_str)
            .map(str::to_string);

        let event = match parse_event(item) {
            Ok(event) => event,
            Err(reason) => {
                tracing::warn!(event_id = ?event_id, reason = %reason, "Event rejected at intake");
                rejected.push(RejectedEvent { event_id, reason });
                continue;
            }
        };

        match state.intake.submit(event) {
            Ok(()) => accepted += 1,
            Err(IngestError::IntakeClosed) => {
                return Err(AppError::Ingest(IngestError::IntakeClosed));
            }
            Err(e) => {
                tracing::warn!(event_id = ?event_id, reason = e.code(), "Event rejected at intake");
                rejected.push(RejectedEvent {
                    event_id,
                    reason: e.code().to_string(),
                });
            }
        }
    }

    tracing::debug!(accepted, rejected = rejected.len(), "Ingestion request handled");
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse { accepted, rejected }),
    ))
}
