//! Domain error types.

use thiserror::Error;

use crate::ids::{CaseId, EntityId, EventId};

/// Top-level domain error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No events exist for the addressed sub-case.
    #[error("sub-case {entity_id} not found in case {case_id}")]
    EntityNotFound {
        /// The case that was searched.
        case_id: CaseId,
        /// The sub-case that has no events.
        entity_id: EntityId,
    },

    /// Optimistic concurrency conflict: the caller's last known version is stale.
    #[error("stale version on case {case_id}: expected version {expected}, found {actual}")]
    StaleVersion {
        /// The case that had the conflict.
        case_id: CaseId,
        /// The version the caller believed was current.
        expected: i64,
        /// The version actually found in the store.
        actual: i64,
    },

    /// The command is not legal in the sub-case's current state.
    #[error("illegal transition on {entity_id}: cannot {attempted} while {state}")]
    IllegalTransition {
        /// The sub-case the command targeted.
        entity_id: EntityId,
        /// Name of the current state.
        state: String,
        /// Name of the attempted event type.
        attempted: String,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// The appended event does not link to the current chain tip of its sub-case.
    #[error(
        "causal chain violation on {entity_id}: chain tip is {expected_previous:?}, event links to {actual_previous:?}"
    )]
    CausalChainViolation {
        /// The sub-case whose chain would be broken.
        entity_id: EntityId,
        /// The real chain tip (`None` for a sub-case without events).
        expected_previous: Option<EventId>,
        /// The predecessor the rejected event claimed.
        actual_previous: Option<EventId>,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Whether the caller can recover by re-reading state or correcting input.
    ///
    /// `CausalChainViolation` and `Infrastructure` are faults, not business
    /// outcomes, and must not be retried blindly.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EntityNotFound { .. }
                | Self::StaleVersion { .. }
                | Self::IllegalTransition { .. }
                | Self::Validation(_)
        )
    }

    /// Whether this is a stale-version conflict, which clients report
    /// separately from invalid input.
    #[must_use]
    pub fn is_stale_version(&self) -> bool {
        matches!(self, Self::StaleVersion { .. })
    }
}
