//! HTTP handlers
//!
//! Axum request handlers for the API endpoints.

pub mod events;
pub mod stats;
pub mod ws;

pub use events::ingest_events;
pub use stats::{health, ws_stats};
pub use ws::live_updates;
