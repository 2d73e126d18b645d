//! Ranking engine
//!
//! Maintains the current Top-N snapshot and diffs each recompute against
//! the previous one. The published snapshot is shared with the read side
//! through `SharedSnapshot` so late joiners never see a half-built view.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::entities::{
    ChangeKind, RankEntry, RankingChange, RankingSnapshot, RepoKey, SnapshotId,
};
use crate::domain::ports::SnapshotProvider;

#[derive(Debug, Clone)]
pub struct RankingConfig {
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Result of one recompute
#[derive(Debug, Clone)]
pub struct RankingUpdate {
    pub snapshot: Arc<RankingSnapshot>,
    pub changes: Vec<RankingChange>,
}

pub struct RankingEngine {
    config: RankingConfig,
    current: Arc<RankingSnapshot>,
}

impl RankingEngine {
    pub fn new(config: RankingConfig) -> Self {
        Self {
            config,
            current: Arc::new(RankingSnapshot::default()),
        }
    }

    /// Rank `(repo_key, score)` pairs and diff against the previous snapshot.
    ///
    /// Ordering is score descending, ties by repository key, so identical
    /// input always yields an identical snapshot. Repositories with a
    /// non-positive or non-finite score are not ranked.
    pub fn recompute<'a, I>(&mut self, scores: I) -> RankingUpdate
    where
        I: IntoIterator<Item = (&'a RepoKey, f64)>,
    {
        let mut ranked: Vec<(&RepoKey, f64)> = scores
            .into_iter()
            .filter(|(_, score)| score.is_finite() && *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(self.config.top_n);

        let entries: Vec<RankEntry> = ranked
            .into_iter()
            .enumerate()
            .map(|(i, (repo_key, activity_score))| RankEntry {
                repo_key: repo_key.clone(),
                rank: i as u32 + 1,
                activity_score,
            })
            .collect();

        let changes = diff(&self.current, &entries);

        let snapshot_id = if changes.is_empty() && entries == self.current.entries {
            self.current.snapshot_id
        } else {
            self.current.snapshot_id.next()
        };
        let snapshot = Arc::new(RankingSnapshot {
            snapshot_id,
            entries,
        });
        self.current = Arc::clone(&snapshot);

        RankingUpdate { snapshot, changes }
    }
}

/// Changes in new-rank order, followed by drops in previous-rank order
fn diff(previous: &RankingSnapshot, entries: &[RankEntry]) -> Vec<RankingChange> {
    let old_ranks: HashMap<&RepoKey, u32> = previous
        .entries
        .iter()
        .map(|e| (&e.repo_key, e.rank))
        .collect();

    let mut changes = Vec::new();
    for entry in entries {
        let change = match old_ranks.get(&entry.repo_key) {
            None => ChangeKind::New,
            Some(&old) if entry.rank < old => ChangeKind::Up,
            Some(&old) if entry.rank > old => ChangeKind::Down,
            Some(_) => continue,
        };
        changes.push(RankingChange {
            repo_key: entry.repo_key.clone(),
            old_rank: old_ranks.get(&entry.repo_key).copied(),
            new_rank: Some(entry.rank),
            activity_score: entry.activity_score,
            change,
        });
    }

    for old in &previous.entries {
        if !entries.iter().any(|e| e.repo_key == old.repo_key) {
            changes.push(RankingChange {
                repo_key: old.repo_key.clone(),
                old_rank: Some(old.rank),
                new_rank: None,
                activity_score: old.activity_score,
                change: ChangeKind::Dropped,
            });
        }
    }

    changes
}

/// Read-side handle to the most recently published snapshot
#[derive(Debug, Default)]
pub struct SharedSnapshot {
    inner: RwLock<Option<Arc<RankingSnapshot>>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published snapshot in one step
    pub fn publish(&self, snapshot: Arc<RankingSnapshot>) {
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }
}

impl SnapshotProvider for SharedSnapshot {
    fn current_snapshot(&self) -> Option<Arc<RankingSnapshot>> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
