//! Aggregate abstraction: a pure transition table over domain events.

use thiserror::Error;

use crate::event::DomainEvent;

/// A `(state, event)` pair that is not in the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transition for {event_type} from state {state}")]
pub struct TransitionError {
    /// Name of the state the event was applied to (`"none"` before creation).
    pub state: &'static str,
    /// The rejected event type.
    pub event_type: &'static str,
}

/// State of one sub-case, derived only from its ordered events.
///
/// `create` and `apply` must be pure: no clock, no I/O, no randomness.
/// Together they form the closed transition table. Any pair they do not
/// accept is reported as a `TransitionError`; the replayer treats that as a
/// corrupted history, command handlers treat it as an illegal command.
pub trait Aggregate: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// The event type this aggregate consumes.
    type Event: DomainEvent;

    /// Short name used in logs.
    const AGGREGATE_TYPE: &'static str;

    /// Builds the initial state from the first event of a chain.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if `event` cannot start a chain.
    fn create(event: &Self::Event) -> Result<Self, TransitionError>;

    /// Applies the next event of the chain.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if the pair is outside the transition table.
    fn apply(self, event: &Self::Event) -> Result<Self, TransitionError>;

    /// Name of the current state, for errors and views.
    fn state_name(&self) -> &'static str;
}
