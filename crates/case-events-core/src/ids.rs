//! Strongly typed identifiers and the id-generation seam.
//!
//! Ids are minted only when a command produces something new. Replay never
//! generates ids, so an injected generator keeps tests deterministic.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_newtype!(
    /// Identifies a case ("sak"), the owner of one version sequence.
    CaseId
);

uuid_newtype!(
    /// Identifies a sub-case ("behandling") and therefore one causal chain.
    EntityId
);

uuid_newtype!(
    /// Globally unique event identifier. Never reused.
    EventId
);

/// Source of fresh identifiers for events and sub-cases.
pub trait IdGenerator: Send + Sync {
    /// Returns a new, never used event id.
    fn next_event_id(&self) -> EventId;

    /// Returns a new, never used sub-case id.
    fn next_entity_id(&self) -> EntityId;
}

/// Production generator backed by time-ordered UUIDv7.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Ids;

impl IdGenerator for UuidV7Ids {
    fn next_event_id(&self) -> EventId {
        EventId(Uuid::now_v7())
    }

    fn next_entity_id(&self) -> EntityId {
        EntityId(Uuid::now_v7())
    }
}
