//! Simulated event source
//!
//! Produces batches of plausible repository events at a fixed interval.
//! Timestamps sit a few seconds behind the wall clock so they pass the
//! aggregator's ordering checks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::domain::entities::{Event, EventId, EventKind, RepoKey};
use crate::domain::ports::EventSource;
use crate::error::UpstreamError;

const SAMPLE_REPOS: &[&str] = &[
    "pathwaycom/pathway",
    "fastapi/fastapi",
    "langchain-ai/langchain",
    "openai/openai-python",
    "microsoft/vscode",
];

const SAMPLE_AUTHORS: &[&str] = &[
    "alice_dev",
    "bob_coder",
    "charlie_eng",
    "diana_tech",
    "eve_programmer",
];

const COMMIT_MESSAGES: &[&str] = &[
    "Fix bug in authentication",
    "Add new feature for data processing",
    "Update documentation",
    "Refactor core module",
    "Improve performance",
    "Add unit tests",
    "Update dependencies",
];

const PR_TITLES: &[&str] = &[
    "Feature: Add dark mode support",
    "Fix: Memory leak in worker thread",
    "Docs: Update installation guide",
    "Refactor: Simplify authentication logic",
    "Fix: Handle edge case in parser",
];

const ISSUE_TITLES: &[&str] = &[
    "Bug: Application crashes on startup",
    "Feature Request: Add batch processing",
    "Question: How to configure logging?",
    "Bug: Memory usage too high",
];

const RELEASE_NAMES: &[&str] = &[
    "v1.0.0 - Initial Release",
    "v1.1.0 - Feature Update",
    "v1.1.1 - Bug Fixes",
    "v2.0.0 - Major Update",
];

/// Maximum lag of a generated timestamp behind the wall clock
const MAX_LAG_SECS: i64 = 30;

pub struct DemoEventSource {
    repos: Vec<RepoKey>,
    batch_size: usize,
    interval: Duration,
    counter: u64,
    started: bool,
    rng: StdRng,
}

impl DemoEventSource {
    pub fn new(batch_size: usize, interval: Duration) -> Self {
        let repos = SAMPLE_REPOS
            .iter()
            .filter_map(|r| RepoKey::parse(r).ok())
            .collect();
        Self {
            repos,
            batch_size,
            interval,
            counter: 0,
            started: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic source for tests
    pub fn seeded(batch_size: usize, interval: Duration, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(batch_size, interval)
        }
    }

    fn generate(&mut self) -> Option<Event> {
        let repo = self.repos.choose(&mut self.rng)?.clone();
        let author = SAMPLE_AUTHORS.choose(&mut self.rng)?.to_string();
        let kind = *[
            EventKind::Commit,
            EventKind::Commit,
            EventKind::PullRequest,
            EventKind::Issue,
            EventKind::Release,
        ]
        .choose(&mut self.rng)?;

        self.counter += 1;
        let n = self.counter;
        let (title, url, payload) = match kind {
            EventKind::Commit => (
                COMMIT_MESSAGES.choose(&mut self.rng)?.to_string(),
                format!("https://github.com/{}/commit/demo{}", repo, n),
                serde_json::json!({ "sha": format!("demo{}", n), "demo": true }),
            ),
            EventKind::PullRequest => (
                PR_TITLES.choose(&mut self.rng)?.to_string(),
                format!("https://github.com/{}/pull/{}", repo, n),
                serde_json::json!({
                    "number": n,
                    "state": *["OPEN", "CLOSED", "MERGED"].choose(&mut self.rng)?,
                    "demo": true,
                }),
            ),
            EventKind::Issue => (
                ISSUE_TITLES.choose(&mut self.rng)?.to_string(),
                format!("https://github.com/{}/issues/{}", repo, n),
                serde_json::json!({
                    "number": n,
                    "state": *["OPEN", "CLOSED"].choose(&mut self.rng)?,
                    "demo": true,
                }),
            ),
            EventKind::Release | EventKind::Other => (
                RELEASE_NAMES.choose(&mut self.rng)?.to_string(),
                format!("https://github.com/{}/releases/tag/demo-v{}", repo, n),
                serde_json::json!({ "tag_name": format!("demo-v{}", n), "demo": true }),
            ),
        };

        let lag = chrono::Duration::seconds(self.rng.gen_range(0..=MAX_LAG_SECS));
        Some(Event {
            event_id: EventId(format!("demo_{}_{}_{}", kind, repo, n)),
            repo_key: repo,
            event_kind: kind,
            author,
            occurred_at: Utc::now() - lag,
            title,
            url,
            payload,
        })
    }
}

#[async_trait]
impl EventSource for DemoEventSource {
    fn name(&self) -> &str {
        "demo"
    }

    async fn next_batch(&mut self) -> Result<Option<Vec<Event>>, UpstreamError> {
        if self.started {
            tokio::time::sleep(self.interval).await;
        }
        self.started = true;

        let batch: Vec<Event> = (0..self.batch_size).filter_map(|_| self.generate()).collect();
        tracing::debug!(count = batch.len(), "Generated demo events");
        Ok(Some(batch))
    }
}
