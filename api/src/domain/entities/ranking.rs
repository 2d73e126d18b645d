//! Ranking snapshot domain entity
//!
//! An immutable, versioned Top-N view. Entries are strictly ordered by
//! score descending, ties broken by repository key.

use serde::{Deserialize, Serialize};

use super::RepoKey;

/// Monotonically increasing snapshot version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub u64);

impl SnapshotId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One ranked repository
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub repo_key: RepoKey,
    /// 1-based rank
    pub rank: u32,
    pub activity_score: f64,
}

/// Immutable Top-N view
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingSnapshot {
    pub snapshot_id: SnapshotId,
    pub entries: Vec<RankEntry>,
}

impl RankingSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Direction of a rank change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Up,
    Down,
    New,
    Dropped,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Up => write!(f, "up"),
            ChangeKind::Down => write!(f, "down"),
            ChangeKind::New => write!(f, "new"),
            ChangeKind::Dropped => write!(f, "dropped"),
        }
    }
}

/// One entry of the diff between consecutive snapshots
#[derive(Debug, Clone, PartialEq)]
pub struct RankingChange {
    pub repo_key: RepoKey,
    /// `None` for newly ranked repositories
    pub old_rank: Option<u32>,
    /// `None` for dropped repositories
    pub new_rank: Option<u32>,
    pub activity_score: f64,
    pub change: ChangeKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_entries_in_rank_order() {
        let snapshot = RankingSnapshot {
            snapshot_id: SnapshotId(3),
            entries: vec![
                RankEntry {
                    repo_key: RepoKey::parse("a/one").unwrap(),
                    rank: 1,
                    activity_score: 9.0,
                },
                RankEntry {
                    repo_key: RepoKey::parse("a/two").unwrap(),
                    rank: 2,
                    activity_score: 4.0,
                },
            ],
        };
        assert_eq!(snapshot.len(), 2);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["snapshot_id"], 3);
        assert_eq!(value["entries"][1]["repo_key"], "a/two");
        assert_eq!(value["entries"][1]["rank"], 2);
        assert!(RankingSnapshot::default().is_empty());
    }

    #[test]
    fn change_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChangeKind::Dropped).unwrap(),
            "\"dropped\""
        );
        assert_eq!(ChangeKind::Up.to_string(), "up");
    }
}
