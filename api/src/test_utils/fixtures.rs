//! Test fixtures
//!
//! Factory functions for creating test data with sensible defaults.
//! Times are offsets from a fixed instant so tests stay deterministic.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::entities::{Event, EventId, EventKind, RepoKey};

/// Fixed instant plus `secs` seconds
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("fixture base time is valid")
        + chrono::Duration::seconds(secs)
}

/// Parse a repository key, panicking on malformed input
pub fn key(raw: &str) -> RepoKey {
    RepoKey::parse(raw).expect("fixture repository key is valid")
}

/// Create a test event with default title, url and payload
pub fn test_event(id: &str, repo: &str, kind: EventKind, occurred_at: DateTime<Utc>) -> Event {
    Event {
        event_id: EventId::from(id),
        repo_key: key(repo),
        event_kind: kind,
        author: "test-author".to_string(),
        occurred_at,
        title: format!("{} on {}", kind, repo),
        url: format!("https://github.com/{}", repo),
        payload: serde_json::json!({ "test": true }),
    }
}

/// Let spawned writer tasks drain their queues
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
