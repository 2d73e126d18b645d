//! Metrics publisher
//!
//! Periodically snapshots global counters and broadcasts `metrics_update`
//! only when at least one of them moved. A failing query-stats
//! collaborator is reported once per outage as an `error` message.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{BroadcastHub, PipelineCounters};
use crate::domain::entities::{ServerMessage, Severity};
use crate::domain::ports::QueryStatsProvider;

/// Retry hint sent with an upstream failure when the collaborator gives none
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_events: u64,
    pub active_repositories: u64,
    pub total_queries: u64,
    pub websocket_connections: u64,
}

impl MetricsSnapshot {
    /// Per-counter deltas, only for counters that changed
    fn changes_since(&self, previous: &MetricsSnapshot) -> BTreeMap<String, i64> {
        let pairs = [
            ("total_events", self.total_events, previous.total_events),
            (
                "active_repositories",
                self.active_repositories,
                previous.active_repositories,
            ),
            ("total_queries", self.total_queries, previous.total_queries),
            (
                "websocket_connections",
                self.websocket_connections,
                previous.websocket_connections,
            ),
        ];
        pairs
            .into_iter()
            .filter(|(_, now, before)| now != before)
            .map(|(name, now, before)| (name.to_string(), now as i64 - before as i64))
            .collect()
    }
}

pub struct MetricsPublisher<Q>
where
    Q: QueryStatsProvider,
{
    counters: Arc<PipelineCounters>,
    queries: Arc<Q>,
    hub: Arc<BroadcastHub>,
    interval: Duration,
    last: MetricsSnapshot,
    upstream_failing: bool,
}

impl<Q> MetricsPublisher<Q>
where
    Q: QueryStatsProvider,
{
    pub fn new(
        counters: Arc<PipelineCounters>,
        queries: Arc<Q>,
        hub: Arc<BroadcastHub>,
        interval: Duration,
    ) -> Self {
        Self {
            counters,
            queries,
            hub,
            interval,
            last: MetricsSnapshot::default(),
            upstream_failing: false,
        }
    }

    /// Take one snapshot; broadcast it if anything changed.
    /// Returns the published snapshot, if one was sent.
    pub async fn publish_once(&mut self) -> Option<MetricsSnapshot> {
        let total_queries = match self.queries.total_queries().await {
            Ok(total) => {
                if self.upstream_failing {
                    tracing::info!("Query stats recovered");
                    self.upstream_failing = false;
                }
                total
            }
            Err(e) => {
                if !self.upstream_failing {
                    tracing::warn!(error = %e, "Query stats unavailable");
                    self.upstream_failing = true;
                    self.hub.broadcast(&ServerMessage::Error {
                        error_code: "query_stats_unavailable".to_string(),
                        message: e.message.clone(),
                        severity: Severity::Warning,
                        details: serde_json::json!({
                            "service": e.service,
                            "code": e.code,
                        }),
                        retry_after_secs: Some(
                            e.retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                        ),
                    });
                }
                self.last.total_queries
            }
        };

        let current = MetricsSnapshot {
            total_events: self.counters.events_processed(),
            active_repositories: self.counters.tracked_repositories(),
            total_queries,
            websocket_connections: self.hub.connection_count() as u64,
        };

        if current == self.last {
            return None;
        }

        let changes = current.changes_since(&self.last);
        self.hub.broadcast(&ServerMessage::MetricsUpdate {
            total_events: current.total_events,
            active_repositories: current.active_repositories,
            total_queries: current.total_queries,
            websocket_connections: current.websocket_connections,
            changes,
        });
        self.last = current;
        Some(current)
    }

    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Some(snapshot) = self.publish_once().await {
                tracing::debug!(?snapshot, "Metrics published");
            }
        }
    }
}
