//! Repository event domain entity
//!
//! The canonical, immutable record produced by the ingestion collaborator
//! and consumed exactly once by the activity aggregator.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Globally unique event identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn repo_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*)/[A-Za-z0-9._-]+$")
            .expect("repository key pattern is valid")
    })
}

/// Repository key in `owner/name` form, unique per repository.
///
/// Ordering is lexical, which the ranking engine relies on for tie-breaks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepoKey(String);

impl RepoKey {
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        let trimmed = raw.trim();
        if trimmed.len() > 200 || !repo_key_pattern().is_match(trimmed) {
            return Err(IngestError::InvalidRepoKey(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for RepoKey {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for RepoKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        RepoKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for RepoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of source-control event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Commit,
    PullRequest,
    Issue,
    Release,
    #[serde(other)]
    Other,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::Commit,
        EventKind::PullRequest,
        EventKind::Issue,
        EventKind::Release,
        EventKind::Other,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Commit => write!(f, "commit"),
            EventKind::PullRequest => write!(f, "pull_request"),
            EventKind::Issue => write!(f, "issue"),
            EventKind::Release => write!(f, "release"),
            EventKind::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "commit" | "push" => Ok(EventKind::Commit),
            "pull_request" | "pr" => Ok(EventKind::PullRequest),
            "issue" | "issues" => Ok(EventKind::Issue),
            "release" => Ok(EventKind::Release),
            "other" => Ok(EventKind::Other),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// A canonical repository event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    #[serde(alias = "repo_full_name")]
    pub repo_key: RepoKey,
    #[serde(alias = "event_type")]
    pub event_kind: EventKind,
    pub author: String,
    #[serde(alias = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    /// Kind-specific attributes
    #[serde(default, alias = "metadata")]
    pub payload: serde_json::Value,
}
