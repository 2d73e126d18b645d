//! Event intake queue
//!
//! Bounded FIFO between ingestion producers and the pipeline. Producers
//! never block: a full queue rejects the event instead.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::domain::entities::Event;
use crate::domain::ports::EventSource;
use crate::error::IngestError;

/// Pause before asking a failed source for another batch
const SOURCE_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Producer side of the intake queue
#[derive(Clone)]
pub struct IntakeHandle {
    tx: mpsc::Sender<Event>,
}

/// Create the intake queue. The receiver belongs to the pipeline.
pub fn event_intake(capacity: usize) -> (IntakeHandle, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (IntakeHandle { tx }, rx)
}

impl IntakeHandle {
    /// Hand an event to the pipeline without waiting
    pub fn submit(&self, event: Event) -> Result<(), IngestError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => IngestError::IntakeFull,
            mpsc::error::TrySendError::Closed(_) => IngestError::IntakeClosed,
        })
    }

    /// Hand an event to the pipeline, waiting for room. Used by pull sources
    /// that can afford to slow down.
    pub async fn submit_wait(&self, event: Event) -> Result<(), IngestError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| IngestError::IntakeClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Pull batches from a source into the intake queue until the source is
/// exhausted or the pipeline goes away. Source failures are logged and
/// retried on the next batch.
pub async fn pump_source<E>(mut source: E, intake: IntakeHandle)
where
    E: EventSource,
{
    tracing::info!(source = source.name(), "Event source started");
    loop {
        match source.next_batch().await {
            Ok(Some(batch)) => {
                let count = batch.len();
                for event in batch {
                    if intake.submit_wait(event).await.is_err() {
                        tracing::info!(source = source.name(), "Intake closed, stopping source");
                        return;
                    }
                }
                tracing::debug!(source = source.name(), count, "Batch submitted");
            }
            Ok(None) => {
                tracing::info!(source = source.name(), "Event source exhausted");
                return;
            }
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "Event source failed");
                tokio::time::sleep(SOURCE_RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::EventKind;
    use crate::test_utils::{at, test_event, ScriptedSource};
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn submit_preserves_order() {
        let (intake, mut rx) = event_intake(4);
        assert_ok!(intake.submit(test_event("e1", "a/b", EventKind::Commit, at(1))));
        assert_ok!(intake.submit(test_event("e2", "a/b", EventKind::Commit, at(2))));

        assert_eq!(rx.recv().await.unwrap().event_id.0, "e1");
        assert_eq!(rx.recv().await.unwrap().event_id.0, "e2");
    }

    #[tokio::test]
    async fn full_queue_rejects_without_blocking() {
        let (intake, _rx) = event_intake(1);
        intake
            .submit(test_event("e1", "a/b", EventKind::Commit, at(1)))
            .unwrap();
        let err = intake
            .submit(test_event("e2", "a/b", EventKind::Commit, at(2)))
            .unwrap_err();
        assert_eq!(err, IngestError::IntakeFull);
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (intake, rx) = event_intake(1);
        drop(rx);
        assert!(intake.is_closed());
        assert_eq!(
            intake
                .submit(test_event("e1", "a/b", EventKind::Commit, at(1)))
                .unwrap_err(),
            IngestError::IntakeClosed
        );
    }

    #[tokio::test]
    async fn pump_forwards_batches_and_survives_failures() {
        let (intake, mut rx) = event_intake(8);
        let source = ScriptedSource::new(vec![
            Ok(vec![test_event("e1", "a/b", EventKind::Commit, at(1))]),
            Err(crate::error::UpstreamError::new("scripted", "boom", "transient")),
            Ok(vec![test_event("e2", "c/d", EventKind::Issue, at(2))]),
        ]);

        pump_source(source, intake).await;

        assert_eq!(rx.recv().await.unwrap().event_id.0, "e1");
        assert_eq!(rx.recv().await.unwrap().event_id.0, "e2");
        assert!(rx.recv().await.is_none());
    }
}
