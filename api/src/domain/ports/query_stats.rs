//! Query statistics port trait
//!
//! The natural-language query subsystem lives outside this service; it only
//! reports how many queries it has answered so far.

use async_trait::async_trait;

use crate::error::UpstreamError;

#[async_trait]
pub trait QueryStatsProvider: Send + Sync {
    /// Cumulative number of queries answered
    async fn total_queries(&self) -> Result<u64, UpstreamError>;
}
