//! Scoring adapters
//!
//! Built-in implementations of the activity score function.

pub mod scorer;

pub use scorer::{build_scorer, DecayingScorer, WeightedScorer};
