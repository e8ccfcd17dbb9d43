//! Downstream event consumers with per-consumer progress tracking.
//!
//! A consumer reacts to committed events after the fact (payment
//! settlement, notifications). Its progress is stored separately from the
//! event log: a failed consumer leaves the event outstanding for the next
//! run and never affects the event itself.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::EventRecord;
use crate::ids::EventId;

/// Stable name of a consumer, used as the checkpoint key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumerId(String);

impl ConsumerId {
    /// Wraps a consumer name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The consumer name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reaction to committed events of given types.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Checkpoint key of this consumer.
    fn consumer_id(&self) -> &ConsumerId;

    /// Event types this consumer handles.
    fn event_types(&self) -> &'static [&'static str];

    /// Handles one event.
    ///
    /// Must be safe to call again for the same event: a crash between
    /// `consume` and `mark_processed` re-delivers it.
    async fn consume(&self, record: &EventRecord) -> Result<(), DomainError>;
}

/// Persistence of which events each consumer has handled.
#[async_trait]
pub trait ConsumerCheckpoints: Send + Sync {
    /// Events of `event_type` not yet processed by `consumer_id`, ordered by
    /// case and then by version.
    async fn outstanding_events(
        &self,
        consumer_id: &ConsumerId,
        event_type: &str,
    ) -> Result<Vec<EventRecord>, DomainError>;

    /// Records that `consumer_id` has handled `event_id`. Marking an event
    /// twice is a no-op.
    async fn mark_processed(
        &self,
        consumer_id: &ConsumerId,
        event_id: EventId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}

/// Outcome of one consumer run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerRunReport {
    /// Events consumed and marked processed.
    pub processed: Vec<EventId>,
    /// Events whose consumption failed; still outstanding.
    pub failed: Vec<EventId>,
}

/// Feeds every outstanding event to `consumer` once.
///
/// Consumer failures are logged and reported, not returned.
///
/// # Errors
///
/// Returns `DomainError` if the checkpoints cannot be read or written.
pub async fn run_consumer(
    consumer: &dyn EventConsumer,
    checkpoints: &dyn ConsumerCheckpoints,
    clock: &dyn Clock,
) -> Result<ConsumerRunReport, DomainError> {
    let consumer_id = consumer.consumer_id();
    let mut report = ConsumerRunReport::default();

    for event_type in consumer.event_types() {
        let outstanding = checkpoints
            .outstanding_events(consumer_id, event_type)
            .await?;
        for record in &outstanding {
            match consumer.consume(record).await {
                Ok(()) => {
                    checkpoints
                        .mark_processed(consumer_id, record.event_id, clock.now())
                        .await?;
                    report.processed.push(record.event_id);
                }
                Err(err) => {
                    tracing::error!(
                        consumer = %consumer_id,
                        event_id = %record.event_id,
                        case_id = %record.case_id,
                        error = %err,
                        "event consumer failed; event stays outstanding"
                    );
                    report.failed.push(record.event_id);
                }
            }
        }
    }

    tracing::debug!(
        consumer = %consumer_id,
        processed = report.processed.len(),
        failed = report.failed.len(),
        "consumer run finished"
    );
    Ok(report)
}
