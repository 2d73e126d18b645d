//! Event source port trait
//!
//! Pull-style ingestion collaborator. Push-style producers (the HTTP
//! ingestion endpoint) submit directly through the intake handle instead.

use async_trait::async_trait;

use crate::domain::entities::Event;
use crate::error::UpstreamError;

#[async_trait]
pub trait EventSource: Send {
    /// Human readable name for logs
    fn name(&self) -> &str;

    /// Wait for and return the next batch of canonical events.
    ///
    /// `Ok(None)` means the source is exhausted and will produce nothing more.
    async fn next_batch(&mut self) -> Result<Option<Vec<Event>>, UpstreamError>;
}
