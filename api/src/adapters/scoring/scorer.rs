//! Weighted and decaying activity scorers

use crate::app::scoring_config::default_weight;
use crate::config::ScoringMode;
use crate::domain::entities::EventKind;
use crate::domain::ports::{ActivityScorer, ScoringWindow};

/// Sum of per-kind weights over the window
#[derive(Debug, Clone)]
pub struct WeightedScorer {
    weight: fn(EventKind) -> f64,
}

impl Default for WeightedScorer {
    fn default() -> Self {
        Self {
            weight: default_weight,
        }
    }
}

impl ActivityScorer for WeightedScorer {
    fn score(&self, window: &ScoringWindow<'_>) -> f64 {
        window.events.iter().map(|e| (self.weight)(e.event_kind)).sum()
    }
}

/// Weighted sum where each event's contribution fades linearly to zero
/// as it ages across the window
#[derive(Debug, Clone)]
pub struct DecayingScorer {
    weight: fn(EventKind) -> f64,
}

impl Default for DecayingScorer {
    fn default() -> Self {
        Self {
            weight: default_weight,
        }
    }
}

impl ActivityScorer for DecayingScorer {
    fn score(&self, window: &ScoringWindow<'_>) -> f64 {
        window
            .events
            .iter()
            .map(|e| (self.weight)(e.event_kind) * (1.0 - window.age_fraction(e.occurred_at)))
            .sum()
    }
}

/// Scorer selected by configuration
pub fn build_scorer(mode: ScoringMode) -> Box<dyn ActivityScorer> {
    match mode {
        ScoringMode::Weighted => Box::new(WeightedScorer::default()),
        ScoringMode::Decaying => Box::new(DecayingScorer::default()),
    }
}
