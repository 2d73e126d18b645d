//! Snapshot provider port trait
//!
//! Supplies the state a late-joining subscriber receives in its
//! `connection` message.

use std::sync::Arc;

use crate::domain::entities::RankingSnapshot;

pub trait SnapshotProvider: Send + Sync {
    /// Latest fully computed ranking snapshot, if any
    fn current_snapshot(&self) -> Option<Arc<RankingSnapshot>>;
}
