//! Full integration tests for RepoPulse API
//!
//! These wire the real components together: intake, pipeline, ranking,
//! hub, and (for the HTTP scenario) the axum router. Subscribers are
//! channel-backed sinks from `test_utils`.
//!
//! Run with: cargo test integration_tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::Utc;
    use serde_json::{json, Value};

    use crate::adapters::scoring::WeightedScorer;
    use crate::app::{
        event_intake, ActivityAggregator, ActivityPipeline, AggregatorConfig, BroadcastHub,
        HubConfig, PipelineConfig, PipelineCounters, PipelineExit, RankingConfig, RankingEngine,
        SharedSnapshot, TrendClassifier, TrendThresholds,
    };
    use crate::config::Config;
    use crate::domain::entities::EventKind;
    use crate::handlers::events::IngestResponse;
    use crate::test_utils::{at, settle, test_event, ChannelSink, SinkProbe};
    use crate::AppState;

    struct Harness {
        pipeline: ActivityPipeline<WeightedScorer>,
        hub: Arc<BroadcastHub>,
        counters: Arc<PipelineCounters>,
    }

    fn harness(tick_interval: Duration) -> Harness {
        let snapshots = Arc::new(SharedSnapshot::new());
        let hub = Arc::new(BroadcastHub::new(HubConfig::default(), snapshots.clone()));
        let counters = Arc::new(PipelineCounters::default());
        let pipeline = ActivityPipeline::new(
            PipelineConfig { tick_interval },
            ActivityAggregator::new(WeightedScorer::default(), AggregatorConfig::default()),
            TrendClassifier::new(TrendThresholds::default()),
            RankingEngine::new(RankingConfig::default()),
            hub.clone(),
            snapshots,
            counters.clone(),
        );
        Harness {
            pipeline,
            hub,
            counters,
        }
    }

    fn subscribe(hub: &BroadcastHub) -> SinkProbe {
        let (sink, probe) = ChannelSink::new();
        hub.accept(sink).unwrap();
        probe
    }

    fn of_type<'a>(frames: &'a [Value], kind: &str) -> Vec<&'a Value> {
        frames.iter().filter(|f| f["type"] == kind).collect()
    }

    /// A client connecting after a recompute sees the current Top-N
    /// without waiting for the next change.
    #[tokio::test]
    async fn late_joiner_receives_current_snapshot() {
        let Harness {
            mut pipeline, hub, ..
        } = harness(Duration::from_secs(5));

        let mut early = subscribe(&hub);
        settle().await;
        let first = early.frames();
        assert_eq!(first[0]["type"], "connection");
        assert!(first[0].get("rankings").is_none());

        pipeline
            .process_event(test_event("e1", "a/b", EventKind::Commit, at(0)), at(0))
            .unwrap();
        pipeline
            .process_event(test_event("e2", "c/d", EventKind::Release, at(1)), at(1))
            .unwrap();
        pipeline.tick(at(5));

        let mut late = subscribe(&hub);
        settle().await;
        let frames = late.frames();
        assert_eq!(frames.len(), 1);
        let connection = &frames[0];
        assert_eq!(connection["type"], "connection");
        assert_eq!(connection["status"], "connected");
        assert_eq!(connection["snapshot_id"], 1);
        assert_eq!(connection["rankings"][0]["repo_key"], "c/d");
        assert_eq!(connection["rankings"][0]["rank"], 1);
        assert_eq!(connection["rankings"][1]["repo_key"], "a/b");
        assert_eq!(connection["rankings"][1]["rank"], 2);
    }

    /// A quieter repository overtakes the leader: one `up` and one `down`,
    /// in new-rank order.
    #[tokio::test]
    async fn overtaking_repository_swaps_ranks() {
        let Harness {
            mut pipeline, hub, ..
        } = harness(Duration::from_secs(5));
        let mut probe = subscribe(&hub);

        for i in 0..3 {
            pipeline
                .process_event(
                    test_event(&format!("a{}", i), "a/b", EventKind::Commit, at(i)),
                    at(i),
                )
                .unwrap();
        }
        pipeline
            .process_event(test_event("c0", "c/d", EventKind::Commit, at(3)), at(3))
            .unwrap();
        pipeline.tick(at(5));
        settle().await;
        probe.frames();

        pipeline
            .process_event(test_event("c1", "c/d", EventKind::Release, at(6)), at(6))
            .unwrap();
        pipeline
            .process_event(test_event("c2", "c/d", EventKind::Release, at(7)), at(7))
            .unwrap();
        pipeline.tick(at(10));
        settle().await;

        let frames = probe.frames();
        let changes = of_type(&frames, "ranking_change");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0]["repo_full_name"], "c/d");
        assert_eq!(changes[0]["change"], "up");
        assert_eq!(changes[0]["old_rank"], 2);
        assert_eq!(changes[0]["new_rank"], 1);
        assert_eq!(changes[0]["activity_score"], 11.0);
        assert_eq!(changes[1]["repo_full_name"], "a/b");
        assert_eq!(changes[1]["change"], "down");
    }

    /// Events submitted to the intake flow through the running pipeline
    /// to subscribers; closing the intake stops the pipeline.
    #[tokio::test]
    async fn intake_to_subscriber_end_to_end() {
        let Harness {
            pipeline,
            hub,
            counters,
        } = harness(Duration::from_millis(50));
        let (intake, rx) = event_intake(16);
        let mut probe = subscribe(&hub);
        let handle = tokio::spawn(pipeline.run(rx));

        let now = Utc::now();
        intake
            .submit(test_event("e1", "a/b", EventKind::PullRequest, now))
            .unwrap();
        intake
            .submit(test_event("e2", "c/d", EventKind::Commit, now))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        let frames = probe.frames();
        let announced: Vec<_> = of_type(&frames, "new_event")
            .iter()
            .map(|f| f["event_id"].clone())
            .collect();
        assert_eq!(announced, vec![json!("e1"), json!("e2")]);

        let ranked = of_type(&frames, "ranking_change");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0]["repo_full_name"], "a/b");
        assert_eq!(ranked[0]["change"], "new");
        assert_eq!(ranked[1]["repo_full_name"], "c/d");

        let summarized: Vec<_> = of_type(&frames, "summary_update")
            .iter()
            .map(|f| f["repo_full_name"].clone())
            .collect();
        assert!(summarized.contains(&json!("a/b")));
        assert!(summarized.contains(&json!("c/d")));
        assert_eq!(counters.events_processed(), 2);
        assert_eq!(counters.tracked_repositories(), 2);
        assert!(counters.ticks() >= 1);

        drop(intake);
        let exit = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, PipelineExit::IntakeClosed);
    }

    /// HTTP ingestion, a duplicate in the batch, and the live pipeline:
    /// the duplicate is rejected on its own and the rest goes through.
    #[tokio::test]
    async fn http_ingestion_isolates_bad_events() {
        let Harness {
            pipeline,
            hub,
            counters,
        } = harness(Duration::from_millis(50));
        let (intake, rx) = event_intake(16);
        tokio::spawn(pipeline.run(rx));

        let state = AppState {
            hub: hub.clone(),
            intake,
            counters: counters.clone(),
            config: Config::default(),
            started_at: Instant::now(),
        };
        let server = TestServer::new(crate::app_router(state)).unwrap();
        let mut probe = subscribe(&hub);

        let now = Utc::now().to_rfc3339();
        let event = |id: &str, repo: &str| {
            json!({
                "event_id": id,
                "repo_key": repo,
                "event_kind": "issue",
                "author": "carol",
                "occurred_at": now,
            })
        };

        let response = server
            .post("/events")
            .json(&json!([
                event("e1", "a/b"),
                event("e1", "a/b"),
                event("e2", "x"),
                event("e3", "c/d"),
            ]))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let body: IngestResponse = response.json();
        assert_eq!(body.accepted, 3);
        assert_eq!(body.rejected.len(), 1);
        assert_eq!(body.rejected[0].reason, "invalid_repo_key");

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(counters.events_processed(), 2);
        assert_eq!(counters.events_rejected(), 1);
        let frames = probe.frames();
        assert_eq!(of_type(&frames, "new_event").len(), 2);

        let health: Value = server.get("/health").await.json();
        assert_eq!(health["tracked_repositories"], 2);
        assert_eq!(health["open_connections"], 1);
    }
}
