//! Activity scoring configuration constants
//!
//! Defines the per-kind event weights used by the built-in scorers.

use crate::domain::entities::EventKind;

/// Weight of a commit (frequent, low impact)
pub const WEIGHT_COMMIT: f64 = 1.0;

/// Weight of an issue (community engagement)
pub const WEIGHT_ISSUE: f64 = 2.0;

/// Weight of a pull request (code contribution)
pub const WEIGHT_PULL_REQUEST: f64 = 3.0;

/// Weight of a release (major milestone)
pub const WEIGHT_RELEASE: f64 = 5.0;

/// Weight of any other event kind
pub const WEIGHT_OTHER: f64 = 1.0;

/// Default weight for an event kind
pub fn default_weight(kind: EventKind) -> f64 {
    match kind {
        EventKind::Commit => WEIGHT_COMMIT,
        EventKind::PullRequest => WEIGHT_PULL_REQUEST,
        EventKind::Issue => WEIGHT_ISSUE,
        EventKind::Release => WEIGHT_RELEASE,
        EventKind::Other => WEIGHT_OTHER,
    }
}
