//! Domain ports (traits)
//!
//! Port traits define interfaces that the domain layer requires.
//! Adapters provide concrete implementations of these traits.

pub mod event_source;
pub mod query_stats;
pub mod scoring;
pub mod snapshot;
pub mod transport;

pub use event_source::EventSource;
pub use query_stats::QueryStatsProvider;
pub use scoring::{ActivityScorer, ScoringWindow};
pub use snapshot::SnapshotProvider;
pub use transport::MessageSink;
