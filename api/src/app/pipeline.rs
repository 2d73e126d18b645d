//! Activity pipeline
//!
//! The single writer. One task owns the aggregator, the trend classifier
//! and the ranking engine, and runs them in strict sequence per tick. The
//! only outward effect is `BroadcastHub::broadcast`, which never waits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::app::summary::render_summary;
use crate::app::{
    ActivityAggregator, BroadcastHub, RankingEngine, SharedSnapshot, TrendClassifier,
    TrendTransition,
};
use crate::domain::entities::{Event, RepoKey, ServerMessage};
use crate::domain::ports::ActivityScorer;
use crate::error::IngestError;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tick_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
        }
    }
}

/// Counters the pipeline exposes to the metrics publisher and HTTP layer
#[derive(Debug, Default)]
pub struct PipelineCounters {
    events_processed: AtomicU64,
    events_rejected: AtomicU64,
    tracked_repositories: AtomicU64,
    ticks: AtomicU64,
}

impl PipelineCounters {
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    pub fn events_rejected(&self) -> u64 {
        self.events_rejected.load(Ordering::Relaxed)
    }

    pub fn tracked_repositories(&self) -> u64 {
        self.tracked_repositories.load(Ordering::Relaxed)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// What one tick produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub trend_changes: usize,
    pub ranking_changes: usize,
    pub summary_updates: usize,
    pub pruned: Vec<RepoKey>,
}

/// Why the pipeline loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineExit {
    /// Every intake handle was dropped
    IntakeClosed,
}

pub struct ActivityPipeline<S>
where
    S: ActivityScorer,
{
    config: PipelineConfig,
    aggregator: ActivityAggregator<S>,
    classifier: TrendClassifier,
    ranking: RankingEngine,
    hub: Arc<BroadcastHub>,
    snapshots: Arc<SharedSnapshot>,
    counters: Arc<PipelineCounters>,
    /// Last summary text sent per repository
    summaries: HashMap<RepoKey, String>,
}

impl<S> ActivityPipeline<S>
where
    S: ActivityScorer,
{
    pub fn new(
        config: PipelineConfig,
        aggregator: ActivityAggregator<S>,
        classifier: TrendClassifier,
        ranking: RankingEngine,
        hub: Arc<BroadcastHub>,
        snapshots: Arc<SharedSnapshot>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            config,
            aggregator,
            classifier,
            ranking,
            hub,
            snapshots,
            counters,
            summaries: HashMap::new(),
        }
    }

    pub fn aggregator(&self) -> &ActivityAggregator<S> {
        &self.aggregator
    }

    /// Ingest one event and announce it. Rejections are logged and counted;
    /// they never affect later events.
    pub fn process_event(&mut self, event: Event, now: DateTime<Utc>) -> Result<(), IngestError> {
        let announcement = ServerMessage::NewEvent {
            event_id: event.event_id.to_string(),
            repo_full_name: event.repo_key.clone(),
            event_type: event.event_kind,
            title: event.title.clone(),
            author: event.author.clone(),
            url: event.url.clone(),
            data: event.payload.clone(),
        };
        let repo = event.repo_key.clone();

        match self.aggregator.ingest(event, now) {
            Ok(state) => {
                tracing::debug!(
                    repo = %repo,
                    score = state.activity_score,
                    events_in_window = state.events_in_window(),
                    "Event ingested"
                );
                self.counters
                    .events_processed
                    .store(self.aggregator.events_processed(), Ordering::Relaxed);
                self.counters
                    .tracked_repositories
                    .store(self.aggregator.tracked_repositories() as u64, Ordering::Relaxed);
                self.hub.broadcast(&announcement);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(repo = %repo, reason = e.code(), error = %e, "Event rejected");
                self.counters.events_rejected.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Age windows, classify trends, re-rank, publish, then prune.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        self.aggregator.tick(now);

        let transitions: Vec<TrendTransition> = self
            .aggregator
            .states()
            .filter_map(|state| self.classifier.observe(state))
            .collect();
        for t in &transitions {
            self.aggregator.set_trend_status(&t.repo_key, t.new_status);
            tracing::info!(
                repo = %t.repo_key,
                from = %t.old_status,
                to = %t.new_status,
                "Trend changed"
            );
            self.hub.broadcast(&ServerMessage::TrendChange {
                repo_full_name: t.repo_key.clone(),
                old_status: t.old_status,
                new_status: t.new_status,
                momentum: t.momentum,
                velocity: t.velocity,
                activity_score: t.activity_score,
            });
        }
        report.trend_changes = transitions.len();

        let update = self.ranking.recompute(
            self.aggregator
                .states()
                .map(|s| (&s.repo_key, s.activity_score)),
        );
        self.snapshots.publish(Arc::clone(&update.snapshot));
        for change in &update.changes {
            self.hub.broadcast(&ServerMessage::RankingChange {
                repo_full_name: change.repo_key.clone(),
                old_rank: change.old_rank,
                new_rank: change.new_rank,
                activity_score: change.activity_score,
                change: change.change,
            });
        }
        report.ranking_changes = update.changes.len();
        if !update.changes.is_empty() {
            tracing::debug!(
                snapshot_id = %update.snapshot.snapshot_id,
                ranked = update.snapshot.len(),
                changes = update.changes.len(),
                "Ranking updated"
            );
        }

        let window = self.aggregator.config().window;
        for state in self.aggregator.states() {
            let summary = render_summary(state, window);
            if self.summaries.get(&state.repo_key) == Some(&summary) {
                continue;
            }
            self.hub.broadcast(&ServerMessage::SummaryUpdate {
                repo_full_name: state.repo_key.clone(),
                summary: summary.clone(),
                activity_score: state.activity_score,
                trend_status: state.trend_status,
                momentum: state.momentum,
                events_in_window: state.events_in_window(),
            });
            self.summaries.insert(state.repo_key.clone(), summary);
            report.summary_updates += 1;
        }

        report.pruned = self.aggregator.prune_idle();
        for repo in &report.pruned {
            self.classifier.forget(repo);
            self.summaries.remove(repo);
            tracing::debug!(repo = %repo, "Pruned idle repository");
        }

        self.counters
            .tracked_repositories
            .store(self.aggregator.tracked_repositories() as u64, Ordering::Relaxed);
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        report
    }

    /// Drive the pipeline from the intake queue and the tick timer
    pub async fn run(mut self, mut intake: mpsc::Receiver<Event>) -> PipelineExit {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            "Activity pipeline started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(Utc::now());
                    if report.trend_changes + report.ranking_changes > 0 {
                        tracing::debug!(
                            trend_changes = report.trend_changes,
                            ranking_changes = report.ranking_changes,
                            summary_updates = report.summary_updates,
                            "Tick complete"
                        );
                    }
                }
                event = intake.recv() => match event {
                    Some(event) => {
                        let _ = self.process_event(event, Utc::now());
                    }
                    None => {
                        tracing::warn!("Intake queue closed, pipeline stopping");
                        return PipelineExit::IntakeClosed;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scoring::WeightedScorer;
    use crate::app::{AggregatorConfig, HubConfig, RankingConfig, TrendThresholds};
    use crate::domain::entities::{EventKind, TrendStatus};
    use crate::test_utils::{at, key, settle, test_event, ChannelSink, SinkProbe};

    fn pipeline(top_n: usize) -> (ActivityPipeline<WeightedScorer>, Arc<BroadcastHub>, Arc<PipelineCounters>) {
        let snapshots = Arc::new(SharedSnapshot::new());
        let hub = Arc::new(BroadcastHub::new(HubConfig::default(), snapshots.clone()));
        let counters = Arc::new(PipelineCounters::default());
        let aggregator = ActivityAggregator::new(
            WeightedScorer::default(),
            AggregatorConfig {
                window: chrono::Duration::seconds(600),
                ..AggregatorConfig::default()
            },
        );
        let pipeline = ActivityPipeline::new(
            PipelineConfig::default(),
            aggregator,
            TrendClassifier::new(TrendThresholds::default()),
            RankingEngine::new(RankingConfig { top_n }),
            hub.clone(),
            snapshots,
            counters.clone(),
        );
        (pipeline, hub, counters)
    }

    async fn subscribe(hub: &BroadcastHub) -> SinkProbe {
        let (sink, mut probe) = ChannelSink::new();
        hub.accept(sink).unwrap();
        settle().await;
        probe.frames();
        probe
    }

    fn of_type<'a>(frames: &'a [serde_json::Value], kind: &str) -> Vec<&'a serde_json::Value> {
        frames.iter().filter(|f| f["type"] == kind).collect()
    }

    #[tokio::test]
    async fn accepted_event_is_announced() {
        let (mut p, hub, counters) = pipeline(10);
        let mut probe = subscribe(&hub).await;

        p.process_event(test_event("e1", "a/b", EventKind::Commit, at(10)), at(10))
            .unwrap();
        settle().await;

        let frames = probe.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "new_event");
        assert_eq!(frames[0]["event_id"], "e1");
        assert_eq!(frames[0]["repo_full_name"], "a/b");
        assert_eq!(frames[0]["event_type"], "commit");
        assert_eq!(counters.events_processed(), 1);
    }

    #[tokio::test]
    async fn rejected_event_is_counted_not_announced() {
        let (mut p, hub, counters) = pipeline(10);
        let mut probe = subscribe(&hub).await;

        p.process_event(test_event("e1", "a/b", EventKind::Commit, at(10)), at(10))
            .unwrap();
        assert!(p
            .process_event(test_event("e1", "a/b", EventKind::Commit, at(11)), at(11))
            .is_err());
        settle().await;

        assert_eq!(of_type(&probe.frames(), "new_event").len(), 1);
        assert_eq!(counters.events_rejected(), 1);
    }

    #[tokio::test]
    async fn ticks_emit_only_actual_transitions() {
        let (mut p, hub, _) = pipeline(10);
        let mut probe = subscribe(&hub).await;

        for i in 0..4 {
            p.process_event(
                test_event(&format!("e{}", i), "a/b", EventKind::Release, at(i)),
                at(i),
            )
            .unwrap();
        }
        probe.frames();

        // score 20 rising fast: HOT is implied but not yet confirmed
        let first = p.tick(at(5));
        assert_eq!(first.ranking_changes, 1);
        assert_eq!(first.trend_changes, 0);

        // flat score: STABLE implied twice, then confirmed
        let second = p.tick(at(10));
        assert_eq!(second.ranking_changes, 0);
        assert_eq!(second.trend_changes, 0);
        let third = p.tick(at(15));
        assert_eq!(third.trend_changes, 1);

        let fourth = p.tick(at(20));
        assert_eq!(fourth, TickReport::default());
        settle().await;

        let frames = probe.frames();
        let ranking = of_type(&frames, "ranking_change");
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0]["change"], "new");
        assert_eq!(ranking[0]["new_rank"], 1);

        let trend = of_type(&frames, "trend_change");
        assert_eq!(trend.len(), 1);
        assert_eq!(trend[0]["old_status"], "QUIET");
        assert_eq!(trend[0]["new_status"], "STABLE");
        assert_eq!(
            p.aggregator().state(&key("a/b")).unwrap().trend_status,
            TrendStatus::Stable
        );

        // first render, momentum settling, trend confirmed
        assert_eq!(of_type(&frames, "summary_update").len(), 3);
    }

    #[tokio::test]
    async fn unchanged_tick_is_silent() {
        let (mut p, hub, _) = pipeline(10);
        p.process_event(test_event("e1", "a/b", EventKind::Commit, at(0)), at(0))
            .unwrap();
        p.tick(at(5));
        p.tick(at(10));
        p.tick(at(15));

        let mut probe = subscribe(&hub).await;
        let report = p.tick(at(20));
        settle().await;

        assert_eq!(report, TickReport::default());
        assert!(probe.frames().is_empty());
    }

    #[tokio::test]
    async fn decayed_repository_is_dropped_then_pruned() {
        let (mut p, hub, counters) = pipeline(10);
        p.process_event(test_event("e1", "a/b", EventKind::Commit, at(0)), at(0))
            .unwrap();
        p.tick(at(5));
        let mut probe = subscribe(&hub).await;

        // one tick past the window: score 0, dropped from ranking, then forgotten
        let report = p.tick(at(700));
        settle().await;

        let frames = probe.frames();
        let dropped = of_type(&frames, "ranking_change");
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0]["change"], "dropped");
        assert_eq!(dropped[0]["old_rank"], 1);
        assert!(dropped[0]["new_rank"].is_null());

        assert_eq!(report.pruned, vec![key("a/b")]);
        assert_eq!(counters.tracked_repositories(), 0);
        assert!(p.aggregator().state(&key("a/b")).is_none());
    }
}
