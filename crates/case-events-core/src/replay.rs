//! Aggregate replay: folding one sub-case's ordered events into its state.
//!
//! Replay is a pure function of the records. A record that breaks the
//! model's invariants (missing link, out-of-order version, transition outside
//! the table) means the history is corrupt or a handler skipped validation.
//! The replayer panics instead of producing a state nobody should trust.

use thiserror::Error;

use crate::aggregate::{Aggregate, TransitionError};
use crate::error::DomainError;
use crate::event::{DomainEvent, EventRecord};
use crate::ids::{CaseId, EntityId, EventId};

/// A replayed history that violates the model's invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayInvariantViolation {
    /// The first event of a chain names a predecessor.
    #[error("event {event_id} starts the chain of {entity_id} but links to {previous}")]
    NotAChainRoot {
        /// The offending event.
        event_id: EventId,
        /// The sub-case being replayed.
        entity_id: EntityId,
        /// The predecessor it claimed.
        previous: EventId,
    },

    /// An event of another case or sub-case was folded into this chain.
    #[error("event {event_id} belongs to {found_case}/{found_entity}, not {case_id}/{entity_id}")]
    ForeignEvent {
        /// The offending event.
        event_id: EventId,
        /// The case being replayed.
        case_id: CaseId,
        /// The sub-case being replayed.
        entity_id: EntityId,
        /// The event's case.
        found_case: CaseId,
        /// The event's sub-case.
        found_entity: EntityId,
    },

    /// Versions did not strictly increase.
    #[error("event {event_id} has version {found} after version {previous}")]
    VersionNotAscending {
        /// The offending event.
        event_id: EventId,
        /// Version of the prior event in the chain.
        previous: i64,
        /// Version of this event.
        found: i64,
    },

    /// The event does not link to the prior event of the chain.
    #[error("event {event_id} links to {found:?}, expected {expected}")]
    BrokenLink {
        /// The offending event.
        event_id: EventId,
        /// The prior event of the chain.
        expected: EventId,
        /// The predecessor it claimed.
        found: Option<EventId>,
    },

    /// The `(state, event)` pair is outside the transition table.
    #[error("event {event_id}: {source}")]
    Transition {
        /// The offending event.
        event_id: EventId,
        /// The rejected pair.
        source: TransitionError,
    },
}

#[track_caller]
fn fail(violation: &ReplayInvariantViolation) -> ! {
    tracing::error!(%violation, "replay invariant violation");
    panic!("replay invariant violation: {violation}")
}

/// The state of one sub-case together with its chain position.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedState<A> {
    /// The case the sub-case belongs to.
    pub case_id: CaseId,
    /// The sub-case identifier.
    pub entity_id: EntityId,
    /// Current domain state.
    pub state: A,
    /// The chain tip; the next event must link to it.
    pub last_event_id: EventId,
    /// Case version of the chain tip.
    pub last_version: i64,
    /// Number of events folded so far.
    pub event_count: usize,
}

impl<A: Aggregate> ReplayedState<A> {
    /// Starts a replay from the first record of a chain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be decoded.
    ///
    /// # Panics
    ///
    /// Panics with a [`ReplayInvariantViolation`] if the record names a
    /// predecessor or is not a creation event.
    pub fn start(record: &EventRecord) -> Result<Self, DomainError> {
        if let Some(previous) = record.previous_event_id {
            fail(&ReplayInvariantViolation::NotAChainRoot {
                event_id: record.event_id,
                entity_id: record.entity_id,
                previous,
            });
        }
        let event = A::Event::from_payload(&record.event_type, &record.payload)?;
        let state = A::create(&event).unwrap_or_else(|source| {
            fail(&ReplayInvariantViolation::Transition {
                event_id: record.event_id,
                source,
            })
        });
        Ok(Self {
            case_id: record.case_id,
            entity_id: record.entity_id,
            state,
            last_event_id: record.event_id,
            last_version: record.version,
            event_count: 1,
        })
    }

    /// Folds the next record of the chain into the state.
    ///
    /// Used both during replay and to advance the state incrementally after a
    /// successful append.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be decoded.
    ///
    /// # Panics
    ///
    /// Panics with a [`ReplayInvariantViolation`] if the record belongs to
    /// another chain, does not link to the tip, does not increase the version,
    /// or is rejected by the transition table.
    pub fn apply_record(self, record: &EventRecord) -> Result<Self, DomainError> {
        if record.case_id != self.case_id || record.entity_id != self.entity_id {
            fail(&ReplayInvariantViolation::ForeignEvent {
                event_id: record.event_id,
                case_id: self.case_id,
                entity_id: self.entity_id,
                found_case: record.case_id,
                found_entity: record.entity_id,
            });
        }
        if record.version <= self.last_version {
            fail(&ReplayInvariantViolation::VersionNotAscending {
                event_id: record.event_id,
                previous: self.last_version,
                found: record.version,
            });
        }
        if record.previous_event_id != Some(self.last_event_id) {
            fail(&ReplayInvariantViolation::BrokenLink {
                event_id: record.event_id,
                expected: self.last_event_id,
                found: record.previous_event_id,
            });
        }
        let event = A::Event::from_payload(&record.event_type, &record.payload)?;
        let state = self.state.apply(&event).unwrap_or_else(|source| {
            fail(&ReplayInvariantViolation::Transition {
                event_id: record.event_id,
                source,
            })
        });
        Ok(Self {
            case_id: self.case_id,
            entity_id: self.entity_id,
            state,
            last_event_id: record.event_id,
            last_version: record.version,
            event_count: self.event_count + 1,
        })
    }
}

/// Replays the chain of `entity_id` out of `events`, which must be ordered
/// ascending by version. Events of other sub-cases are skipped, so a whole
/// case log can be passed in.
///
/// Returns `None` when the sub-case has no events.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a payload cannot be decoded.
///
/// # Panics
///
/// Panics with a [`ReplayInvariantViolation`] on a corrupt chain.
pub fn replay<A: Aggregate>(
    entity_id: EntityId,
    events: &[EventRecord],
) -> Result<Option<ReplayedState<A>>, DomainError> {
    let mut replayed: Option<ReplayedState<A>> = None;
    for record in events.iter().filter(|r| r.entity_id == entity_id) {
        replayed = Some(match replayed {
            None => ReplayedState::start(record)?,
            Some(current) => current.apply_record(record)?,
        });
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;
    use crate::aggregate::test_fixtures::{Ticket, TicketEvent};
    use crate::event::EventMetadata;

    fn record(
        case_id: CaseId,
        entity_id: EntityId,
        version: i64,
        previous: Option<EventId>,
        event: &TicketEvent,
    ) -> EventRecord {
        EventRecord {
            event_id: EventId::from_uuid(Uuid::new_v4()),
            case_id,
            entity_id,
            version,
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            event_type: event.event_type().to_owned(),
            payload: event.to_payload().unwrap(),
            metadata: EventMetadata {
                actor_identity: "Z123456".to_owned(),
                correlation_id: Uuid::nil(),
                caller_roles: Vec::new(),
            },
            previous_event_id: previous,
        }
    }

    /// Builds a well-linked chain for one entity, versions starting at 1.
    fn chain(case_id: CaseId, entity_id: EntityId, events: &[TicketEvent]) -> Vec<EventRecord> {
        let mut records: Vec<EventRecord> = Vec::new();
        for (i, event) in events.iter().enumerate() {
            let previous = records.last().map(|r| r.event_id);
            let version = i64::try_from(i + 1).unwrap();
            records.push(record(case_id, entity_id, version, previous, event));
        }
        records
    }

    fn ids() -> (CaseId, EntityId) {
        (
            CaseId::from_uuid(Uuid::new_v4()),
            EntityId::from_uuid(Uuid::new_v4()),
        )
    }

    #[test]
    fn test_replay_returns_none_for_unknown_entity() {
        let (_, entity_id) = ids();

        let replayed = replay::<Ticket>(entity_id, &[]).unwrap();

        assert!(replayed.is_none());
    }

    #[test]
    fn test_replay_folds_events_in_order() {
        // Arrange
        let (case_id, entity_id) = ids();
        let records = chain(
            case_id,
            entity_id,
            &[
                TicketEvent::Opened {
                    title: "overpayment".to_owned(),
                },
                TicketEvent::Noted {
                    text: "first".to_owned(),
                },
                TicketEvent::Noted {
                    text: "second".to_owned(),
                },
            ],
        );

        // Act
        let replayed = replay::<Ticket>(entity_id, &records).unwrap().unwrap();

        // Assert
        assert_eq!(replayed.state.title, "overpayment");
        assert_eq!(replayed.state.notes, vec!["first", "second"]);
        assert_eq!(replayed.last_event_id, records[2].event_id);
        assert_eq!(replayed.last_version, 3);
        assert_eq!(replayed.event_count, 3);
    }

    #[test]
    fn test_replay_skips_other_entities_in_a_shared_case_log() {
        // Arrange
        let (case_id, entity_a) = ids();
        let entity_b = EntityId::from_uuid(Uuid::new_v4());
        let open_a = record(
            case_id,
            entity_a,
            1,
            None,
            &TicketEvent::Opened {
                title: "a".to_owned(),
            },
        );
        let open_b = record(
            case_id,
            entity_b,
            2,
            None,
            &TicketEvent::Opened {
                title: "b".to_owned(),
            },
        );
        let close_a = record(case_id, entity_a, 3, Some(open_a.event_id), &TicketEvent::Closed);
        let log = vec![open_a, open_b, close_a];

        // Act
        let a = replay::<Ticket>(entity_a, &log).unwrap().unwrap();
        let b = replay::<Ticket>(entity_b, &log).unwrap().unwrap();

        // Assert
        assert!(a.state.closed);
        assert_eq!(a.last_version, 3);
        assert!(!b.state.closed);
        assert_eq!(b.last_version, 2);
    }

    #[test]
    #[should_panic(expected = "replay invariant violation")]
    fn test_replay_panics_on_transition_outside_table() {
        let (case_id, entity_id) = ids();
        let records = chain(
            case_id,
            entity_id,
            &[
                TicketEvent::Opened {
                    title: "t".to_owned(),
                },
                TicketEvent::Closed,
                TicketEvent::Noted {
                    text: "after close".to_owned(),
                },
            ],
        );

        let _ = replay::<Ticket>(entity_id, &records);
    }

    #[test]
    #[should_panic(expected = "replay invariant violation")]
    fn test_replay_panics_on_chain_starting_with_non_creation_event() {
        let (case_id, entity_id) = ids();
        let records = chain(case_id, entity_id, &[TicketEvent::Closed]);

        let _ = replay::<Ticket>(entity_id, &records);
    }

    #[test]
    #[should_panic(expected = "replay invariant violation")]
    fn test_replay_panics_on_broken_link() {
        let (case_id, entity_id) = ids();
        let mut records = chain(
            case_id,
            entity_id,
            &[
                TicketEvent::Opened {
                    title: "t".to_owned(),
                },
                TicketEvent::Closed,
            ],
        );
        records[1].previous_event_id = Some(EventId::from_uuid(Uuid::new_v4()));

        let _ = replay::<Ticket>(entity_id, &records);
    }

    #[test]
    #[should_panic(expected = "replay invariant violation")]
    fn test_replay_panics_on_descending_version() {
        let (case_id, entity_id) = ids();
        let mut records = chain(
            case_id,
            entity_id,
            &[
                TicketEvent::Opened {
                    title: "t".to_owned(),
                },
                TicketEvent::Closed,
            ],
        );
        records[1].version = 1;

        let _ = replay::<Ticket>(entity_id, &records);
    }

    #[test]
    fn test_replay_reports_unknown_event_type_as_infrastructure_error() {
        let (case_id, entity_id) = ids();
        let mut records = chain(
            case_id,
            entity_id,
            &[TicketEvent::Opened {
                title: "t".to_owned(),
            }],
        );
        records[0].event_type = "ticket.reopened.v9".to_owned();

        let result = replay::<Ticket>(entity_id, &records);

        match result {
            Err(DomainError::Infrastructure(msg)) => assert!(msg.contains("ticket.reopened.v9")),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    fn notes_strategy() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-z]{1,8}", 0..12)
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(notes in notes_strategy()) {
            let (case_id, entity_id) = ids();
            let mut events = vec![TicketEvent::Opened { title: "t".to_owned() }];
            events.extend(notes.into_iter().map(|text| TicketEvent::Noted { text }));
            let records = chain(case_id, entity_id, &events);

            let first = replay::<Ticket>(entity_id, &records).unwrap();
            let second = replay::<Ticket>(entity_id, &records).unwrap();

            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_prefix_plus_one_is_one_transition(notes in notes_strategy()) {
            let (case_id, entity_id) = ids();
            let mut events = vec![TicketEvent::Opened { title: "t".to_owned() }];
            events.extend(notes.into_iter().map(|text| TicketEvent::Noted { text }));
            events.push(TicketEvent::Closed);
            let records = chain(case_id, entity_id, &events);
            let k = records.len() - 1;

            let prefix = replay::<Ticket>(entity_id, &records[..k]).unwrap().unwrap();
            let full = replay::<Ticket>(entity_id, &records).unwrap().unwrap();
            let stepped = prefix.apply_record(&records[k]).unwrap();

            prop_assert_eq!(stepped, full);
        }
    }
}
