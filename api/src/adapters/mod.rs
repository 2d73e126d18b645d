//! Adapters layer
//!
//! Implementations of port traits for external systems.

pub mod demo;
pub mod query;
pub mod scoring;
pub mod ws;

pub use demo::DemoEventSource;
pub use query::NoopQueryStats;
pub use scoring::build_scorer;
pub use ws::WsSink;
