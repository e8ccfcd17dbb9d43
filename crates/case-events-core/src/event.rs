//! Event record model and the domain event abstraction.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::ids::{CaseId, EntityId, EventId};

/// Cross-cutting attributes stored once per event, independent of payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Identity of the actor that issued the command.
    pub actor_identity: String,
    /// Correlation ID for tracing a request through its effects.
    pub correlation_id: Uuid,
    /// Roles the caller held when issuing the command.
    pub caller_roles: Vec<String>,
}

/// An event that is ready to be appended but has no version yet.
///
/// The store assigns the version atomically; everything else is fixed by
/// the command handler that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: EventId,
    /// Case whose version sequence this event joins.
    pub case_id: CaseId,
    /// Sub-case whose causal chain this event extends.
    pub entity_id: EntityId,
    /// Versioned type discriminator.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Actor, correlation and role metadata.
    pub metadata: EventMetadata,
    /// The chain tip this event follows; `None` starts a new chain.
    pub previous_event_id: Option<EventId>,
    /// Timestamp of business occurrence.
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    /// Turns the pending event into a committed record with `version`.
    #[must_use]
    pub fn into_record(self, version: i64) -> EventRecord {
        EventRecord {
            event_id: self.event_id,
            case_id: self.case_id,
            entity_id: self.entity_id,
            version,
            occurred_at: self.occurred_at,
            event_type: self.event_type,
            payload: self.payload,
            metadata: self.metadata,
            previous_event_id: self.previous_event_id,
        }
    }
}

/// Stored representation of a domain event. Immutable once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Unique event identifier.
    pub event_id: EventId,
    /// Case that owns the version sequence.
    pub case_id: CaseId,
    /// Sub-case this event's causal chain belongs to.
    pub entity_id: EntityId,
    /// Gapless, strictly increasing version within the case.
    pub version: i64,
    /// Timestamp of business occurrence.
    pub occurred_at: DateTime<Utc>,
    /// Versioned type discriminator.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Actor, correlation and role metadata.
    pub metadata: EventMetadata,
    /// Predecessor in the sub-case's causal chain.
    pub previous_event_id: Option<EventId>,
}

/// Trait that all domain event enums implement.
///
/// The mapping between variants and the persisted `event_type` string is an
/// explicit, closed `match` in both directions.
pub trait DomainEvent: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Returns the versioned event type name.
    fn event_type(&self) -> &'static str;

    /// Serializes the variant's payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Rebuilds the event from its stored discriminator and payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` for unknown types or payloads
    /// that do not match the type's schema.
    fn from_payload(event_type: &str, payload: &serde_json::Value) -> Result<Self, DomainError>;
}

/// Serializes a payload struct, mapping failures to `DomainError`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if serialization fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(payload)
        .map_err(|e| DomainError::Infrastructure(format!("event serialization failed: {e}")))
}

/// Deserializes a payload struct, mapping failures to `DomainError`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the payload does not match `T`.
pub fn decode_payload<T: DeserializeOwned>(
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<T, DomainError> {
    T::deserialize(payload).map_err(|e| {
        DomainError::Infrastructure(format!("event deserialization failed for {event_type}: {e}"))
    })
}

/// Error for a discriminator outside the closed set of a domain.
#[must_use]
pub fn unknown_event_type(event_type: &str) -> DomainError {
    DomainError::Infrastructure(format!("unknown event type: {event_type}"))
}
