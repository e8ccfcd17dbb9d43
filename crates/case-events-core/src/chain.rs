//! Version and causal-chain integrity of a whole case log.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::event::EventRecord;
use crate::ids::{CaseId, EntityId, EventId};

/// One sub-case's chain as found in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainSummary {
    /// The sub-case.
    pub entity_id: EntityId,
    /// First event of the chain.
    pub root: EventId,
    /// Newest event of the chain.
    pub tip: EventId,
    /// Number of events in the chain.
    pub length: usize,
}

/// Result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseIntegrity {
    /// The verified case.
    pub case_id: CaseId,
    /// Current version of the case.
    pub version: i64,
    /// Chains in order of their first event.
    pub chains: Vec<ChainSummary>,
}

/// The first broken invariant found in a case log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityViolation {
    /// An event of another case is in the log.
    #[error("event {event_id} belongs to case {found}")]
    ForeignCase {
        /// The offending event.
        event_id: EventId,
        /// Its case.
        found: CaseId,
    },

    /// Versions are not exactly `1, 2, 3, ...` in order.
    #[error("event {event_id} has version {found}, expected {expected}")]
    VersionGap {
        /// The offending event.
        event_id: EventId,
        /// The version that should be at this position.
        expected: i64,
        /// The version found.
        found: i64,
    },

    /// An event id appears twice.
    #[error("event {event_id} appears more than once")]
    DuplicateEventId {
        /// The repeated id.
        event_id: EventId,
    },

    /// The predecessor is not an earlier event of the log.
    #[error("event {event_id} links to {previous}, which is not an earlier event")]
    MissingPredecessor {
        /// The offending event.
        event_id: EventId,
        /// The missing predecessor.
        previous: EventId,
    },

    /// The predecessor belongs to another sub-case.
    #[error("event {event_id} links to {previous} of another sub-case")]
    CrossEntityLink {
        /// The offending event.
        event_id: EventId,
        /// The foreign predecessor.
        previous: EventId,
    },

    /// Two events claim the same predecessor.
    #[error("event {previous} has two successors: {first} and {second}")]
    ForkedChain {
        /// The shared predecessor.
        previous: EventId,
        /// The earlier successor.
        first: EventId,
        /// The later successor.
        second: EventId,
    },

    /// A sub-case has more than one chain start.
    #[error("sub-case {entity_id} has two roots: {first} and {second}")]
    MultipleRoots {
        /// The sub-case.
        entity_id: EntityId,
        /// The first root.
        first: EventId,
        /// The second root.
        second: EventId,
    },

    /// Walking back from the tip does not visit every event of the chain.
    #[error("sub-case {entity_id}: walk from tip reaches {reachable} of {total} events")]
    UnreachableEvents {
        /// The sub-case.
        entity_id: EntityId,
        /// Events visited by the backward walk.
        reachable: usize,
        /// Events recorded for the sub-case.
        total: usize,
    },
}

/// Verifies the version sequence and every causal chain of one case.
///
/// `records` must be the case log as returned by `read_for_case`.
///
/// # Errors
///
/// Returns the first [`IntegrityViolation`] found.
pub fn verify_case(
    case_id: CaseId,
    records: &[EventRecord],
) -> Result<CaseIntegrity, IntegrityViolation> {
    let mut by_id: HashMap<EventId, &EventRecord> = HashMap::with_capacity(records.len());
    let mut successor_of: HashMap<EventId, EventId> = HashMap::new();
    let mut order: Vec<EntityId> = Vec::new();
    let mut chains: HashMap<EntityId, ChainSummary> = HashMap::new();

    for (expected, record) in (1_i64..).zip(records) {
        if record.case_id != case_id {
            return Err(IntegrityViolation::ForeignCase {
                event_id: record.event_id,
                found: record.case_id,
            });
        }
        if record.version != expected {
            return Err(IntegrityViolation::VersionGap {
                event_id: record.event_id,
                expected,
                found: record.version,
            });
        }
        if by_id.contains_key(&record.event_id) {
            return Err(IntegrityViolation::DuplicateEventId {
                event_id: record.event_id,
            });
        }

        match record.previous_event_id {
            None => {
                if let Some(existing) = chains.get(&record.entity_id) {
                    return Err(IntegrityViolation::MultipleRoots {
                        entity_id: record.entity_id,
                        first: existing.root,
                        second: record.event_id,
                    });
                }
                order.push(record.entity_id);
                chains.insert(
                    record.entity_id,
                    ChainSummary {
                        entity_id: record.entity_id,
                        root: record.event_id,
                        tip: record.event_id,
                        length: 1,
                    },
                );
            }
            Some(previous) => {
                let Some(predecessor) = by_id.get(&previous) else {
                    return Err(IntegrityViolation::MissingPredecessor {
                        event_id: record.event_id,
                        previous,
                    });
                };
                if predecessor.entity_id != record.entity_id {
                    return Err(IntegrityViolation::CrossEntityLink {
                        event_id: record.event_id,
                        previous,
                    });
                }
                if let Some(first) = successor_of.insert(previous, record.event_id) {
                    return Err(IntegrityViolation::ForkedChain {
                        previous,
                        first,
                        second: record.event_id,
                    });
                }
                // The predecessor was seen, so its chain exists.
                if let Some(summary) = chains.get_mut(&record.entity_id) {
                    summary.tip = record.event_id;
                    summary.length += 1;
                }
            }
        }
        by_id.insert(record.event_id, record);
    }

    let mut summaries = Vec::with_capacity(order.len());
    for entity_id in order {
        let Some(summary) = chains.remove(&entity_id) else {
            continue;
        };
        let reachable = walk_back(&by_id, summary.tip, summary.length);
        if reachable != summary.length {
            return Err(IntegrityViolation::UnreachableEvents {
                entity_id,
                reachable,
                total: summary.length,
            });
        }
        summaries.push(summary);
    }

    Ok(CaseIntegrity {
        case_id,
        version: records.last().map_or(0, |r| r.version),
        chains: summaries,
    })
}

/// Follows `previous_event_id` from `tip` to the root, counting events.
/// Stops after `limit + 1` steps so a cycle cannot loop forever.
fn walk_back(by_id: &HashMap<EventId, &EventRecord>, tip: EventId, limit: usize) -> usize {
    let mut visited = 0;
    let mut cursor = Some(tip);
    while let Some(id) = cursor {
        let Some(record) = by_id.get(&id) else {
            break;
        };
        visited += 1;
        if visited > limit {
            break;
        }
        cursor = record.previous_event_id;
    }
    visited
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;
    use crate::event::EventMetadata;

    /// Appends one event for `entity` to `log`, linked to that entity's tip.
    fn push(log: &mut Vec<EventRecord>, case_id: CaseId, entity_id: EntityId) {
        let previous = log
            .iter()
            .rev()
            .find(|r| r.entity_id == entity_id)
            .map(|r| r.event_id);
        let version = i64::try_from(log.len()).unwrap() + 1;
        log.push(EventRecord {
            event_id: EventId::from_uuid(Uuid::new_v4()),
            case_id,
            entity_id,
            version,
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            event_type: "test.event.v1".to_owned(),
            payload: serde_json::json!({}),
            metadata: EventMetadata {
                actor_identity: "Z123456".to_owned(),
                correlation_id: Uuid::nil(),
                caller_roles: Vec::new(),
            },
            previous_event_id: previous,
        });
    }

    fn two_entity_log() -> (CaseId, EntityId, EntityId, Vec<EventRecord>) {
        let case_id = CaseId::from_uuid(Uuid::new_v4());
        let a = EntityId::from_uuid(Uuid::new_v4());
        let b = EntityId::from_uuid(Uuid::new_v4());
        let mut log = Vec::new();
        push(&mut log, case_id, a);
        push(&mut log, case_id, b);
        push(&mut log, case_id, a);
        push(&mut log, case_id, a);
        push(&mut log, case_id, b);
        (case_id, a, b, log)
    }

    #[test]
    fn test_verify_case_accepts_interleaved_chains() {
        // Arrange
        let (case_id, a, b, log) = two_entity_log();

        // Act
        let integrity = verify_case(case_id, &log).unwrap();

        // Assert
        assert_eq!(integrity.version, 5);
        assert_eq!(integrity.chains.len(), 2);
        assert_eq!(integrity.chains[0].entity_id, a);
        assert_eq!(integrity.chains[0].length, 3);
        assert_eq!(integrity.chains[0].root, log[0].event_id);
        assert_eq!(integrity.chains[0].tip, log[3].event_id);
        assert_eq!(integrity.chains[1].entity_id, b);
        assert_eq!(integrity.chains[1].length, 2);
    }

    #[test]
    fn test_verify_case_accepts_empty_log() {
        let case_id = CaseId::from_uuid(Uuid::new_v4());

        let integrity = verify_case(case_id, &[]).unwrap();

        assert_eq!(integrity.version, 0);
        assert!(integrity.chains.is_empty());
    }

    #[test]
    fn test_verify_case_detects_version_gap() {
        let (case_id, _, _, mut log) = two_entity_log();
        log[2].version = 4;

        let err = verify_case(case_id, &log).unwrap_err();

        assert_eq!(
            err,
            IntegrityViolation::VersionGap {
                event_id: log[2].event_id,
                expected: 3,
                found: 4,
            }
        );
    }

    #[test]
    fn test_verify_case_detects_fork() {
        let (case_id, _, _, mut log) = two_entity_log();
        // Event 4 now claims the same predecessor as event 3.
        log[3].previous_event_id = log[2].previous_event_id;

        let err = verify_case(case_id, &log).unwrap_err();

        assert_eq!(
            err,
            IntegrityViolation::ForkedChain {
                previous: log[0].event_id,
                first: log[2].event_id,
                second: log[3].event_id,
            }
        );
    }

    #[test]
    fn test_verify_case_detects_cross_entity_link() {
        let (case_id, _, _, mut log) = two_entity_log();
        log[4].previous_event_id = Some(log[3].event_id);

        let err = verify_case(case_id, &log).unwrap_err();

        assert!(matches!(err, IntegrityViolation::CrossEntityLink { .. }));
    }

    #[test]
    fn test_verify_case_detects_second_root() {
        let (case_id, a, _, mut log) = two_entity_log();
        log[3].previous_event_id = None;

        let err = verify_case(case_id, &log).unwrap_err();

        assert_eq!(
            err,
            IntegrityViolation::MultipleRoots {
                entity_id: a,
                first: log[0].event_id,
                second: log[3].event_id,
            }
        );
    }

    #[test]
    fn test_verify_case_detects_link_to_later_event() {
        let (case_id, _, _, mut log) = two_entity_log();
        log[2].previous_event_id = Some(log[3].event_id);

        let err = verify_case(case_id, &log).unwrap_err();

        assert!(matches!(err, IntegrityViolation::MissingPredecessor { .. }));
    }

    #[test]
    fn test_verify_case_detects_foreign_case() {
        let (case_id, _, _, mut log) = two_entity_log();
        let other = CaseId::from_uuid(Uuid::new_v4());
        log[1].case_id = other;

        let err = verify_case(case_id, &log).unwrap_err();

        assert_eq!(
            err,
            IntegrityViolation::ForeignCase {
                event_id: log[1].event_id,
                found: other,
            }
        );
    }

    proptest! {
        #[test]
        fn prop_any_interleaving_of_linked_appends_verifies(
            picks in proptest::collection::vec(0usize..4, 1..40)
        ) {
            let case_id = CaseId::from_uuid(Uuid::new_v4());
            let entities: Vec<EntityId> =
                (0..4).map(|_| EntityId::from_uuid(Uuid::new_v4())).collect();
            let mut log = Vec::new();
            for pick in &picks {
                push(&mut log, case_id, entities[*pick]);
            }

            let integrity = verify_case(case_id, &log).unwrap();

            let total: usize = integrity.chains.iter().map(|c| c.length).sum();
            prop_assert_eq!(total, picks.len());
            prop_assert_eq!(integrity.version, i64::try_from(picks.len()).unwrap());
            for chain in &integrity.chains {
                let expected = picks.iter().filter(|p| entities[**p] == chain.entity_id).count();
                prop_assert_eq!(chain.length, expected);
            }
        }
    }
}
