//! Test utilities
//!
//! Manual mock implementations and test fixtures for unit testing.
//!
//! Why manual mocks instead of mockall?
//! - the transport and source ports are async traits with `&mut self`
//!   receivers, which mockall expectations make awkward to drive
//! - Manual mocks are more explicit and easier to debug
//! - Probes let a test inspect what a subscriber actually received

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
