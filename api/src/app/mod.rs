//! Application layer
//!
//! The activity pipeline and the services it drives. Everything that
//! mutates repository state lives behind the single-writer pipeline; the
//! broadcast hub is the only component shared across tasks.

pub mod aggregator;
pub mod broadcast_hub;
pub mod intake;
pub mod metrics_publisher;
pub mod pipeline;
pub mod ranking_engine;
pub mod scoring_config;
pub mod summary;
pub mod trend_classifier;

pub use aggregator::{ActivityAggregator, AggregatorConfig};
pub use broadcast_hub::{BroadcastHub, HubConfig, HubStats};
pub use intake::{event_intake, pump_source, IntakeHandle};
pub use metrics_publisher::MetricsPublisher;
pub use pipeline::{ActivityPipeline, PipelineConfig, PipelineCounters, PipelineExit};
pub use ranking_engine::{RankingConfig, RankingEngine, SharedSnapshot};
pub use trend_classifier::{TrendClassifier, TrendThresholds, TrendTransition};
