//! Repository activity state
//!
//! One `RepositoryActivityState` per tracked repository, owned exclusively
//! by the activity aggregator. The trend classifier writes `trend_status`
//! back after each tick.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Event, EventKind, RepoKey};

/// Qualitative direction of a repository's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Momentum {
    Accelerating,
    Steady,
    Decelerating,
}

impl Momentum {
    /// Label a velocity, treating `|velocity| <= threshold` as steady
    pub fn from_velocity(velocity: f64, threshold: f64) -> Self {
        if velocity > threshold {
            Momentum::Accelerating
        } else if velocity < -threshold {
            Momentum::Decelerating
        } else {
            Momentum::Steady
        }
    }
}

impl std::fmt::Display for Momentum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Momentum::Accelerating => write!(f, "ACCELERATING"),
            Momentum::Steady => write!(f, "STEADY"),
            Momentum::Decelerating => write!(f, "DECELERATING"),
        }
    }
}

/// Discrete trend status, ordered by increasing activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStatus {
    Quiet,
    Cooling,
    Stable,
    Active,
    Hot,
}

impl Default for TrendStatus {
    fn default() -> Self {
        TrendStatus::Quiet
    }
}

impl std::fmt::Display for TrendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendStatus::Quiet => write!(f, "QUIET"),
            TrendStatus::Cooling => write!(f, "COOLING"),
            TrendStatus::Stable => write!(f, "STABLE"),
            TrendStatus::Active => write!(f, "ACTIVE"),
            TrendStatus::Hot => write!(f, "HOT"),
        }
    }
}

impl std::str::FromStr for TrendStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "QUIET" => Ok(TrendStatus::Quiet),
            "COOLING" => Ok(TrendStatus::Cooling),
            "STABLE" => Ok(TrendStatus::Stable),
            "ACTIVE" => Ok(TrendStatus::Active),
            "HOT" => Ok(TrendStatus::Hot),
            _ => Err(format!("Unknown trend status: {}", s)),
        }
    }
}

/// Per-kind event counts within the window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub commits: usize,
    pub pull_requests: usize,
    pub issues: usize,
    pub releases: usize,
    pub other: usize,
}

/// Sliding-window activity state for one repository
#[derive(Debug, Clone)]
pub struct RepositoryActivityState {
    pub repo_key: RepoKey,
    /// Events inside the active window, oldest first
    pub window_events: VecDeque<Event>,
    pub activity_score: f64,
    /// Score points per minute across the recent tick history
    pub velocity: f64,
    pub momentum: Momentum,
    pub trend_status: TrendStatus,
    pub last_event_time: Option<DateTime<Utc>>,
    /// `(tick time, score)` samples, oldest first, used for velocity
    pub(crate) score_history: VecDeque<(DateTime<Utc>, f64)>,
}

impl RepositoryActivityState {
    pub fn new(repo_key: RepoKey) -> Self {
        Self {
            repo_key,
            window_events: VecDeque::new(),
            activity_score: 0.0,
            velocity: 0.0,
            momentum: Momentum::Steady,
            trend_status: TrendStatus::Quiet,
            last_event_time: None,
            score_history: VecDeque::new(),
        }
    }

    /// Insert keeping `window_events` ordered by `occurred_at`.
    ///
    /// Events with equal timestamps keep arrival order.
    pub fn insert_event(&mut self, event: Event) {
        let at = event.occurred_at;
        let idx = self
            .window_events
            .partition_point(|e| e.occurred_at <= at);
        self.window_events.insert(idx, event);
        if self.last_event_time.map_or(true, |last| at > last) {
            self.last_event_time = Some(at);
        }
    }

    /// Drop events that occurred before `now - window`. Returns the number evicted.
    pub fn evict_before(&mut self, now: DateTime<Utc>, window: Duration) -> usize {
        let cutoff = now - window;
        let mut evicted = 0;
        while self
            .window_events
            .front()
            .is_some_and(|e| e.occurred_at < cutoff)
        {
            self.window_events.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn events_in_window(&self) -> usize {
        self.window_events.len()
    }

    pub fn kind_counts(&self) -> KindCounts {
        let mut counts = KindCounts::default();
        for event in &self.window_events {
            match event.event_kind {
                EventKind::Commit => counts.commits += 1,
                EventKind::PullRequest => counts.pull_requests += 1,
                EventKind::Issue => counts.issues += 1,
                EventKind::Release => counts.releases += 1,
                EventKind::Other => counts.other += 1,
            }
        }
        counts
    }

    /// True when the repository has fully cooled down and can be forgotten
    pub fn is_idle(&self) -> bool {
        self.window_events.is_empty()
            && self.activity_score <= 0.0
            && self.trend_status == TrendStatus::Quiet
    }
}
