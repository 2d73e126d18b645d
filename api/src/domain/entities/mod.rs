//! Domain entities
//!
//! Pure domain models for the activity pipeline and the live broadcast hub.

pub mod activity;
pub mod connection;
pub mod event;
pub mod message;
pub mod ranking;

pub use activity::{KindCounts, Momentum, RepositoryActivityState, TrendStatus};
pub use connection::{ClientId, ConnectionState, DisconnectReason};
pub use event::{Event, EventId, EventKind, RepoKey};
pub use message::{ClientMessage, ServerMessage, Severity};
pub use ranking::{ChangeKind, RankEntry, RankingChange, RankingSnapshot, SnapshotId};
