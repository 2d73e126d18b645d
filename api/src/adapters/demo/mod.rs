//! Demo adapter
//!
//! Simulated event source for running the service without a real feed.

pub mod source;

pub use source::DemoEventSource;
