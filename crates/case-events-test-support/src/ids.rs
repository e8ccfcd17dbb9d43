//! Test ids: predictable `IdGenerator` for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use case_events_core::ids::{EntityId, EventId, IdGenerator};
use uuid::Uuid;

/// Hands out `00000000-0000-0000-0000-000000000001`, `...02` and so on.
/// Event and entity ids draw from one counter, so they never collide.
#[derive(Debug, Default)]
pub struct SequenceIds {
    next: AtomicU64,
}

impl SequenceIds {
    /// Starts the sequence at 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_uuid(&self) -> Uuid {
        Uuid::from_u128(u128::from(self.next.fetch_add(1, Ordering::Relaxed) + 1))
    }
}

impl IdGenerator for SequenceIds {
    fn next_event_id(&self) -> EventId {
        EventId::from_uuid(self.next_uuid())
    }

    fn next_entity_id(&self) -> EntityId {
        EntityId::from_uuid(self.next_uuid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ids_count_up_across_kinds() {
        let ids = SequenceIds::new();

        let entity = ids.next_entity_id();
        let event = ids.next_event_id();

        assert_eq!(entity.as_uuid(), Uuid::from_u128(1));
        assert_eq!(event.as_uuid(), Uuid::from_u128(2));
    }
}
