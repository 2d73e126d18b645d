//! Trend classifier
//!
//! Five-state hysteresis machine per repository. The state implied by the
//! current `(activity_score, velocity)` only becomes the confirmed status
//! once it has persisted for `persistence_ticks` consecutive ticks, or
//! immediately when the score moved by at least `large_jump` since the
//! previous tick.

use std::collections::HashMap;

use crate::domain::entities::{Momentum, RepoKey, RepositoryActivityState, TrendStatus};

/// Classification thresholds
#[derive(Debug, Clone)]
pub struct TrendThresholds {
    /// Scores at or below this are QUIET
    pub quiet_score: f64,
    /// Minimum score for a rising repository to count as HOT
    pub high_score: f64,
    /// Scores at or above this are HOT regardless of direction
    pub very_high_score: f64,
    /// Velocity (points/min) at or above which a repository is rising
    pub rising_velocity: f64,
    /// Velocity magnitude at or above which a falling repository is COOLING
    pub falling_velocity: f64,
    /// Consecutive ticks a new implied state must hold before it is confirmed
    pub persistence_ticks: u32,
    /// Score change since the previous tick that confirms a transition at once
    pub large_jump: f64,
}

impl Default for TrendThresholds {
    fn default() -> Self {
        Self {
            quiet_score: 1.0,
            high_score: 20.0,
            very_high_score: 50.0,
            rising_velocity: 0.5,
            falling_velocity: 0.5,
            persistence_ticks: 2,
            large_jump: 25.0,
        }
    }
}

impl TrendThresholds {
    /// The status implied purely by the current score and velocity
    pub fn implied(&self, activity_score: f64, velocity: f64) -> TrendStatus {
        if activity_score <= self.quiet_score {
            TrendStatus::Quiet
        } else if activity_score >= self.very_high_score {
            TrendStatus::Hot
        } else if velocity >= self.rising_velocity {
            if activity_score >= self.high_score {
                TrendStatus::Hot
            } else {
                TrendStatus::Active
            }
        } else if velocity <= -self.falling_velocity {
            TrendStatus::Cooling
        } else {
            TrendStatus::Stable
        }
    }
}

/// A confirmed trend transition
#[derive(Debug, Clone, PartialEq)]
pub struct TrendTransition {
    pub repo_key: RepoKey,
    pub old_status: TrendStatus,
    pub new_status: TrendStatus,
    pub momentum: Momentum,
    pub velocity: f64,
    pub activity_score: f64,
}

#[derive(Debug, Clone)]
struct TrendTracker {
    current: TrendStatus,
    /// Candidate status and how many consecutive ticks it has been implied
    pending: Option<(TrendStatus, u32)>,
    /// Score observed on the previous tick
    last_score: f64,
}

impl Default for TrendTracker {
    fn default() -> Self {
        Self {
            current: TrendStatus::Quiet,
            pending: None,
            last_score: 0.0,
        }
    }
}

pub struct TrendClassifier {
    thresholds: TrendThresholds,
    trackers: HashMap<RepoKey, TrendTracker>,
}

impl TrendClassifier {
    pub fn new(thresholds: TrendThresholds) -> Self {
        Self {
            thresholds,
            trackers: HashMap::new(),
        }
    }

    /// Feed one tick's state for a repository. Returns a transition only
    /// when the confirmed status changes. Call once per repository per tick.
    pub fn observe(&mut self, state: &RepositoryActivityState) -> Option<TrendTransition> {
        let implied = self
            .thresholds
            .implied(state.activity_score, state.velocity);
        let tracker = self.trackers.entry(state.repo_key.clone()).or_default();

        let jump = (state.activity_score - tracker.last_score).abs();
        tracker.last_score = state.activity_score;

        if implied == tracker.current {
            tracker.pending = None;
            return None;
        }

        let streak = match tracker.pending {
            Some((candidate, count)) if candidate == implied => count + 1,
            _ => 1,
        };

        let large_jump = jump >= self.thresholds.large_jump;
        if streak < self.thresholds.persistence_ticks && !large_jump {
            tracker.pending = Some((implied, streak));
            return None;
        }

        let old_status = tracker.current;
        tracker.current = implied;
        tracker.pending = None;

        Some(TrendTransition {
            repo_key: state.repo_key.clone(),
            old_status,
            new_status: implied,
            momentum: state.momentum,
            velocity: state.velocity,
            activity_score: state.activity_score,
        })
    }

    /// Confirmed status; QUIET for repositories never observed
    pub fn status(&self, repo_key: &RepoKey) -> TrendStatus {
        self.trackers
            .get(repo_key)
            .map(|t| t.current)
            .unwrap_or_default()
    }

    /// Drop tracking for a pruned repository
    pub fn forget(&mut self, repo_key: &RepoKey) {
        self.trackers.remove(repo_key);
    }
}
