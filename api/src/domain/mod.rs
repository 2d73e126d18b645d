//! Domain layer
//!
//! Contains pure business logic with no external dependencies.
//! - `entities`: Domain models for events, activity, rankings and wire messages
//! - `ports`: Trait definitions for pluggable collaborators

pub mod entities;
pub mod ports;
