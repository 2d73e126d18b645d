//! Service status handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::HubStats;
use crate::AppState;

/// GET /ws-stats
pub async fn ws_stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.hub.stats())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub open_connections: usize,
    pub tracked_repositories: u64,
    pub events_processed: u64,
    pub events_rejected: u64,
    pub ticks: u64,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.intake.is_closed() {
            "degraded"
        } else {
            "ok"
        },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        open_connections: state.hub.connection_count(),
        tracked_repositories: state.counters.tracked_repositories(),
        events_processed: state.counters.events_processed(),
        events_rejected: state.counters.events_rejected(),
        ticks: state.counters.ticks(),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::config::Config;
    use crate::test_utils::{settle, ChannelSink};
    use crate::AppState;

    #[tokio::test]
    async fn health_reports_version_and_counts() {
        let (state, _rx) = AppState::for_tests(Config::default(), 8);
        let server = TestServer::new(crate::app_router(state)).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["open_connections"], 0);
        assert_eq!(body["tracked_repositories"], 0);
        assert_eq!(body["events_rejected"], 0);
    }

    #[tokio::test]
    async fn ws_stats_lists_connected_clients() {
        let (state, _rx) = AppState::for_tests(Config::default(), 8);
        let hub = state.hub.clone();
        let server = TestServer::new(crate::app_router(state)).unwrap();

        let (sink, _probe) = ChannelSink::new();
        let client_id = hub.accept(sink).unwrap();
        settle().await;

        let body: serde_json::Value = server.get("/ws-stats").await.json();
        assert_eq!(body["open_connections"], 1);
        assert_eq!(body["clients"][0]["client_id"], client_id.to_string());
        assert_eq!(body["clients"][0]["messages_sent"], 1);
        assert_eq!(body["total_messages_sent"], 1);
    }
}
