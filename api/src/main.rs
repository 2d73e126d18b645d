//! RepoPulse API Server
//!
//! Live repository activity scoring: ingests source-control events, keeps a
//! sliding-window activity score per repository, classifies trends, ranks the
//! most active repositories and pushes every change to WebSocket subscribers.
//! Uses hexagonal (ports & adapters) architecture for clean separation of concerns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    routing::{get, post},
    Router,
};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod app;
mod config;
mod domain;
mod error;
mod handlers;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod integration_tests;

use adapters::{build_scorer, DemoEventSource, NoopQueryStats};
use app::{
    event_intake, pump_source, ActivityAggregator, ActivityPipeline, BroadcastHub, IntakeHandle,
    MetricsPublisher, PipelineCounters, RankingEngine, SharedSnapshot, TrendClassifier,
};
use config::Config;
use domain::entities::Severity;

/// Time given to connection writers to flush the shutdown notice
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub intake: IntakeHandle,
    pub counters: Arc<PipelineCounters>,
    pub config: Config,
    pub started_at: Instant,
}

#[cfg(test)]
impl AppState {
    /// State with a fresh hub and intake; the returned receiver stands in
    /// for the pipeline
    pub fn for_tests(
        config: Config,
        intake_capacity: usize,
    ) -> (Self, tokio::sync::mpsc::Receiver<domain::entities::Event>) {
        let hub = Arc::new(BroadcastHub::new(
            config.hub.clone(),
            Arc::new(SharedSnapshot::new()),
        ));
        let (intake, rx) = event_intake(intake_capacity);
        let state = Self {
            hub,
            intake,
            counters: Arc::new(PipelineCounters::default()),
            config,
            started_at: Instant::now(),
        };
        (state, rx)
    }
}

/// Build the HTTP router
pub fn app_router(state: AppState) -> Router {
    let mut ingest = Router::new().route("/events", post(handlers::ingest_events));

    // Per-IP limit on ingestion only; PeerIpKeyExtractor needs ConnectInfo
    if let Some(per_second) = state.config.ingest_rate_per_second {
        match GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(per_second)
            .burst_size(state.config.ingest_rate_burst)
            .finish()
        {
            Some(governor_config) => {
                ingest = ingest.layer(GovernorLayer {
                    config: Arc::new(governor_config),
                });
            }
            None => tracing::warn!("Invalid ingestion rate limit, serving without one"),
        }
    }

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ws-stats", get(handlers::ws_stats))
        .route("/ws/live-updates", get(handlers::live_updates))
        .merge(ingest)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,repopulse_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RepoPulse API...");

    // Load configuration
    let config = Config::from_env()?;
    if !config.signature_required() {
        tracing::warn!("WEBHOOK_SECRET not set, ingestion signatures will not be checked");
    }

    let snapshots = Arc::new(SharedSnapshot::new());
    let hub = Arc::new(BroadcastHub::new(config.hub.clone(), snapshots.clone()));
    let counters = Arc::new(PipelineCounters::default());
    let (intake, intake_rx) = event_intake(config.intake_capacity);

    // Single writer for all activity state
    let pipeline = ActivityPipeline::new(
        config.pipeline.clone(),
        ActivityAggregator::new(build_scorer(config.scoring_mode), config.aggregator.clone()),
        TrendClassifier::new(config.trend.clone()),
        RankingEngine::new(config.ranking.clone()),
        hub.clone(),
        snapshots,
        counters.clone(),
    );
    let mut pipeline_task = tokio::spawn(pipeline.run(intake_rx));

    let heartbeat_task = tokio::spawn(hub.clone().run_heartbeat());
    let metrics_task = tokio::spawn(
        MetricsPublisher::new(
            counters.clone(),
            Arc::new(NoopQueryStats),
            hub.clone(),
            config.metrics_interval,
        )
        .run(),
    );

    let demo_task = if config.demo.enabled {
        tracing::info!(
            batch_size = config.demo.batch_size,
            interval_secs = config.demo.batch_interval.as_secs(),
            "Demo event source enabled"
        );
        let source = DemoEventSource::new(config.demo.batch_size, config.demo.batch_interval);
        Some(tokio::spawn(pump_source(source, intake.clone())))
    } else {
        None
    };

    let state = AppState {
        hub: hub.clone(),
        intake,
        counters,
        config: config.clone(),
        started_at: Instant::now(),
    };
    let app = app_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    let mut server_task = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    });

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            hub.shutdown(Severity::Warning, "Service is shutting down");
            Ok(())
        }
        exit = &mut pipeline_task => {
            tracing::error!(?exit, "Activity pipeline terminated");
            hub.shutdown(Severity::Critical, "Activity pipeline stopped unexpectedly");
            Err(anyhow::anyhow!("activity pipeline terminated"))
        }
        served = &mut server_task => {
            tracing::error!(?served, "HTTP server stopped");
            hub.shutdown(Severity::Critical, "HTTP server stopped unexpectedly");
            Err(anyhow::anyhow!("HTTP server stopped"))
        }
    };

    tokio::time::sleep(SHUTDOWN_GRACE).await;

    heartbeat_task.abort();
    metrics_task.abort();
    if let Some(task) = demo_task {
        task.abort();
    }
    pipeline_task.abort();
    server_task.abort();

    tracing::info!("RepoPulse API stopped");
    outcome
}
