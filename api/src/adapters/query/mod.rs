//! Query subsystem adapter
//!
//! The question-answering subsystem is deployed separately; until it
//! reports its counters here, a no-op provider stands in.

use async_trait::async_trait;

use crate::domain::ports::QueryStatsProvider;
use crate::error::UpstreamError;

/// Reports zero queries
pub struct NoopQueryStats;

#[async_trait]
impl QueryStatsProvider for NoopQueryStats {
    async fn total_queries(&self) -> Result<u64, UpstreamError> {
        Ok(0)
    }
}
