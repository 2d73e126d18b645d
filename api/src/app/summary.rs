//! Repository summary rendering
//!
//! Renders the one-line, human-readable status text carried by
//! `summary_update` notifications.

use chrono::Duration;

use crate::domain::entities::RepositoryActivityState;

/// Render a summary line for one repository
pub fn render_summary(state: &RepositoryActivityState, window: Duration) -> String {
    let counts = state.kind_counts();
    let mut line = format!(
        "{} is {} with {} events in {} window. Activity: {} commits, {} PRs, {} issues, {} releases",
        state.repo_key,
        state.trend_status,
        state.events_in_window(),
        window_label(window),
        counts.commits,
        counts.pull_requests,
        counts.issues,
        counts.releases,
    );
    if counts.other > 0 {
        line.push_str(&format!(", {} other", counts.other));
    }
    line.push_str(&format!(
        ". Score: {:.0} points. Momentum: {}.",
        state.activity_score, state.momentum
    ));
    line
}

/// Compact label for a window span (`1h`, `30m`, `90s`)
fn window_label(window: Duration) -> String {
    let secs = window.num_seconds();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
