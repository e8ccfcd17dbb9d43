//! Generic command scaffolding.
//!
//! Every command follows the same call chain: load the sub-case's chain,
//! replay it, let the business rule decide, check the transition table,
//! append with the caller's expected version, fold the new record into the
//! state. Business crates provide only the `decide` step.

use std::sync::Arc;

use tracing::instrument;

use crate::aggregate::{Aggregate, TransitionError};
use crate::clock::Clock;
use crate::command::CommandContext;
use crate::error::DomainError;
use crate::event::{DomainEvent, EventRecord, NewEvent};
use crate::ids::{CaseId, EntityId, IdGenerator};
use crate::replay::{ReplayedState, replay};
use crate::store::EventStore;

/// Result of a handled command.
#[derive(Debug, Clone)]
pub struct CommandOutcome<A> {
    /// The appended record, or `None` when the command changed nothing.
    pub record: Option<EventRecord>,
    /// Sub-case state after the command.
    pub state: ReplayedState<A>,
}

/// Explicitly wired engine. Holds no state of its own between calls.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

fn illegal(entity_id: EntityId, err: &TransitionError) -> DomainError {
    DomainError::IllegalTransition {
        entity_id,
        state: err.state.to_owned(),
        attempted: err.event_type.to_owned(),
    }
}

/// Checks `event` against the transition table without changing `state`.
///
/// `execute` runs this after `decide`; a `decide` step may call it first so
/// that an illegal command is reported before any business validation.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` if the pair is not in the table.
pub fn check_transition<A: Aggregate>(
    entity_id: EntityId,
    state: &A,
    event: &A::Event,
) -> Result<(), DomainError> {
    state
        .clone()
        .apply(event)
        .map(|_| ())
        .map_err(|e| illegal(entity_id, &e))
}

fn log_fault(err: &DomainError) {
    if !err.is_recoverable() {
        tracing::error!(error = %err, "append failed with a non-recoverable error");
    }
}

impl Engine {
    /// Wires an engine from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { store, clock, ids }
    }

    /// The underlying event store.
    #[must_use]
    pub fn store(&self) -> &dyn EventStore {
        self.store.as_ref()
    }

    /// The clock stamping new events.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Loads and replays one sub-case.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EntityNotFound` if the sub-case has no events,
    /// or `DomainError::Infrastructure` if reading or decoding fails.
    ///
    /// # Panics
    ///
    /// Panics if the stored chain violates the replay invariants.
    pub async fn load<A: Aggregate>(
        &self,
        case_id: CaseId,
        entity_id: EntityId,
    ) -> Result<ReplayedState<A>, DomainError> {
        let events = self.store.read_chain_for_entity(case_id, entity_id).await?;
        replay::<A>(entity_id, &events)?.ok_or(DomainError::EntityNotFound { case_id, entity_id })
    }

    /// Starts a new sub-case with its creation event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if `event` cannot start a
    /// chain, `DomainError::StaleVersion` if the case has moved past
    /// `expected_version`, or any error of the store.
    #[instrument(
        skip(self, context, event),
        fields(aggregate = A::AGGREGATE_TYPE, case_id = %case_id, event_type = event.event_type())
    )]
    pub async fn start<A: Aggregate>(
        &self,
        case_id: CaseId,
        context: &CommandContext,
        expected_version: i64,
        event: A::Event,
    ) -> Result<CommandOutcome<A>, DomainError> {
        let entity_id = self.ids.next_entity_id();
        A::create(&event).map_err(|e| illegal(entity_id, &e))?;

        let new_event = NewEvent {
            event_id: self.ids.next_event_id(),
            case_id,
            entity_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload()?,
            metadata: context.to_metadata(),
            previous_event_id: None,
            occurred_at: self.clock.now(),
        };
        let record = self
            .store
            .append(new_event, expected_version)
            .await
            .inspect_err(log_fault)?;
        let state = ReplayedState::start(&record)?;

        tracing::debug!(entity_id = %entity_id, version = record.version, "sub-case started");
        Ok(CommandOutcome {
            record: Some(record),
            state,
        })
    }

    /// Runs one command against an existing sub-case.
    ///
    /// `decide` sees the replayed state and returns the event to append, or
    /// `None` when the command is already satisfied. The event is checked
    /// against the transition table before anything is written.
    ///
    /// # Errors
    ///
    /// Returns whatever `decide` returns, `DomainError::EntityNotFound`,
    /// `DomainError::IllegalTransition` if the transition table rejects the
    /// event, `DomainError::StaleVersion` if the case has moved past
    /// `expected_version`, or any error of the store.
    ///
    /// # Panics
    ///
    /// Panics if the stored chain violates the replay invariants.
    #[instrument(
        skip(self, context, decide),
        fields(aggregate = A::AGGREGATE_TYPE, case_id = %case_id, entity_id = %entity_id)
    )]
    pub async fn execute<A, F>(
        &self,
        case_id: CaseId,
        entity_id: EntityId,
        context: &CommandContext,
        expected_version: i64,
        decide: F,
    ) -> Result<CommandOutcome<A>, DomainError>
    where
        A: Aggregate,
        F: FnOnce(&A) -> Result<Option<A::Event>, DomainError> + Send,
    {
        let current = self.load::<A>(case_id, entity_id).await?;
        let Some(event) = decide(&current.state)? else {
            tracing::debug!("command produced no event");
            return Ok(CommandOutcome {
                record: None,
                state: current,
            });
        };
        check_transition(entity_id, &current.state, &event)?;

        let new_event = NewEvent {
            event_id: self.ids.next_event_id(),
            case_id,
            entity_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload()?,
            metadata: context.to_metadata(),
            previous_event_id: Some(current.last_event_id),
            occurred_at: self.clock.now(),
        };
        let record = self
            .store
            .append(new_event, expected_version)
            .await
            .inspect_err(log_fault)?;
        let state = current.apply_record(&record)?;

        Ok(CommandOutcome {
            record: Some(record),
            state,
        })
    }
}
