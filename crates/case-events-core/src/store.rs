//! Event store abstraction.
//!
//! The store is append-only. `append` is the single correctness-critical
//! operation: reading the current version, comparing it with the caller's
//! expectation, checking the chain tip and assigning `current + 1` must be
//! one atomic step per case. There is no update or delete.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::{EventRecord, NewEvent};
use crate::ids::{CaseId, EntityId, EventId};

/// Repository trait for appending and reading case events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Current version of a case: the highest assigned version, `0` if empty.
    async fn current_version(&self, case_id: CaseId) -> Result<i64, DomainError>;

    /// Appends one event with optimistic concurrency.
    ///
    /// `expected_version` is the case version the caller last observed. On
    /// success the event is assigned `expected_version + 1`.
    ///
    /// Fails with `DomainError::StaleVersion` if the case has moved on, and
    /// with `DomainError::CausalChainViolation` if `previous_event_id` is not
    /// the current tip of the event's sub-case. Nothing is written on failure.
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError>;

    /// All events of a case, ascending by version.
    async fn read_for_case(&self, case_id: CaseId) -> Result<Vec<EventRecord>, DomainError>;

    /// The causal chain of one sub-case, ascending by version.
    async fn read_chain_for_entity(
        &self,
        case_id: CaseId,
        entity_id: EntityId,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let mut events = self.read_for_case(case_id).await?;
        events.retain(|e| e.entity_id == entity_id);
        Ok(events)
    }
}

/// The check an `append` runs against a case log before assigning a version.
///
/// Backends call this while holding whatever serializes appends for the case
/// (a mutex, a transaction), passing the current version and the sub-case's
/// current tip.
///
/// # Errors
///
/// Returns `DomainError::StaleVersion` if `expected_version` is not
/// `current_version`, otherwise `DomainError::CausalChainViolation` if the
/// event does not link to `chain_tip`.
pub fn check_append(
    event: &NewEvent,
    expected_version: i64,
    current_version: i64,
    chain_tip: Option<EventId>,
) -> Result<(), DomainError> {
    if expected_version != current_version {
        tracing::warn!(
            case_id = %event.case_id,
            expected = expected_version,
            actual = current_version,
            "rejecting append with stale version"
        );
        return Err(DomainError::StaleVersion {
            case_id: event.case_id,
            expected: expected_version,
            actual: current_version,
        });
    }
    if event.previous_event_id != chain_tip {
        tracing::error!(
            case_id = %event.case_id,
            entity_id = %event.entity_id,
            event_id = %event.event_id,
            "rejecting append that does not extend the chain tip"
        );
        return Err(DomainError::CausalChainViolation {
            entity_id: event.entity_id,
            expected_previous: chain_tip,
            actual_previous: event.previous_event_id,
        });
    }
    Ok(())
}
