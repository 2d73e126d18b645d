//! Activity scoring port trait
//!
//! The score formula is pluggable; the aggregator only requires a pure
//! function of the current window.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::domain::entities::Event;

/// Read-only view of one repository's window at a point in time
#[derive(Debug, Clone, Copy)]
pub struct ScoringWindow<'a> {
    /// Events inside the window, oldest first
    pub events: &'a VecDeque<Event>,
    pub now: DateTime<Utc>,
    pub span: Duration,
}

impl<'a> ScoringWindow<'a> {
    /// Fraction of the window elapsed since `at`, clamped to `[0, 1]`
    pub fn age_fraction(&self, at: DateTime<Utc>) -> f64 {
        let span_ms = self.span.num_milliseconds();
        if span_ms <= 0 {
            return 1.0;
        }
        let age_ms = (self.now - at).num_milliseconds().max(0);
        (age_ms as f64 / span_ms as f64).min(1.0)
    }
}

/// Port trait for the activity score function
pub trait ActivityScorer: Send + Sync {
    /// Score a window. Must be deterministic and return a finite value >= 0.
    fn score(&self, window: &ScoringWindow<'_>) -> f64;
}

impl ActivityScorer for Box<dyn ActivityScorer> {
    fn score(&self, window: &ScoringWindow<'_>) -> f64 {
        (**self).score(window)
    }
}
