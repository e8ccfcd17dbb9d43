//! In-memory `EventStore`, used by tests and single-process tools.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use case_events_core::consumer::{ConsumerCheckpoints, ConsumerId};
use case_events_core::error::DomainError;
use case_events_core::event::{EventRecord, NewEvent};
use case_events_core::ids::{CaseId, EntityId, EventId};
use case_events_core::store::{EventStore, check_append};
use chrono::{DateTime, Utc};

use crate::error::StoreError;

#[derive(Debug, Default)]
struct Inner {
    cases: HashMap<CaseId, Vec<EventRecord>>,
    // Case of every stored event, for consumer lookups.
    event_cases: HashMap<EventId, CaseId>,
    processed: HashSet<(ConsumerId, EventId)>,
}

/// Event store that keeps every case log in memory.
///
/// One mutex guards all logs, so the version check, the chain-tip check
/// and the push happen as one step.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, DomainError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned.into())
    }
}

fn version_of(log: Option<&Vec<EventRecord>>) -> i64 {
    log.and_then(|events| events.last()).map_or(0, |e| e.version)
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn current_version(&self, case_id: CaseId) -> Result<i64, DomainError> {
        let inner = self.lock()?;
        Ok(version_of(inner.cases.get(&case_id)))
    }

    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        let mut inner = self.lock()?;
        if inner.event_cases.contains_key(&event.event_id) {
            return Err(DomainError::Infrastructure(format!(
                "duplicate event id {}",
                event.event_id
            )));
        }
        let log = inner.cases.get(&event.case_id);
        let current = version_of(log);
        let tip = log.and_then(|events| {
            events
                .iter()
                .rev()
                .find(|e| e.entity_id == event.entity_id)
                .map(|e| e.event_id)
        });
        check_append(&event, expected_version, current, tip)?;

        let record = event.into_record(current + 1);
        inner.event_cases.insert(record.event_id, record.case_id);
        inner
            .cases
            .entry(record.case_id)
            .or_default()
            .push(record.clone());
        tracing::debug!(
            case_id = %record.case_id,
            entity_id = %record.entity_id,
            version = record.version,
            event_type = %record.event_type,
            "event appended"
        );
        Ok(record)
    }

    async fn read_for_case(&self, case_id: CaseId) -> Result<Vec<EventRecord>, DomainError> {
        let inner = self.lock()?;
        Ok(inner.cases.get(&case_id).cloned().unwrap_or_default())
    }

    async fn read_chain_for_entity(
        &self,
        case_id: CaseId,
        entity_id: EntityId,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let inner = self.lock()?;
        Ok(inner
            .cases
            .get(&case_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.entity_id == entity_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ConsumerCheckpoints for InMemoryEventStore {
    async fn outstanding_events(
        &self,
        consumer_id: &ConsumerId,
        event_type: &str,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let inner = self.lock()?;
        let mut case_ids: Vec<&CaseId> = inner.cases.keys().collect();
        case_ids.sort();
        Ok(case_ids
            .into_iter()
            .filter_map(|case_id| inner.cases.get(case_id))
            .flatten()
            .filter(|e| e.event_type == event_type)
            .filter(|e| !inner.processed.contains(&(consumer_id.clone(), e.event_id)))
            .cloned()
            .collect())
    }

    async fn mark_processed(
        &self,
        consumer_id: &ConsumerId,
        event_id: EventId,
        _processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let mut inner = self.lock()?;
        if !inner.event_cases.contains_key(&event_id) {
            return Err(DomainError::Infrastructure(format!(
                "cannot mark unknown event {event_id} as processed"
            )));
        }
        inner.processed.insert((consumer_id.clone(), event_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use case_events_core::chain::verify_case;
    use case_events_core::event::EventMetadata;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use uuid::Uuid;

    use super::*;

    fn new_event(case_id: CaseId, entity_id: EntityId, previous: Option<EventId>) -> NewEvent {
        NewEvent {
            event_id: EventId::from_uuid(Uuid::new_v4()),
            case_id,
            entity_id,
            event_type: "test.event.v1".to_owned(),
            payload: serde_json::json!({"n": 1}),
            metadata: EventMetadata {
                actor_identity: "Z123456".to_owned(),
                correlation_id: Uuid::new_v4(),
                caller_roles: Vec::new(),
            },
            previous_event_id: previous,
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    fn ids() -> (CaseId, EntityId) {
        (
            CaseId::from_uuid(Uuid::new_v4()),
            EntityId::from_uuid(Uuid::new_v4()),
        )
    }

    #[tokio::test]
    async fn test_empty_case_is_at_version_zero() {
        let store = InMemoryEventStore::new();
        let (case_id, _) = ids();

        assert_eq!(store.current_version(case_id).await.unwrap(), 0);
        assert!(store.read_for_case(case_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_assigns_consecutive_versions() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (case_id, entity_id) = ids();

        // Act
        let first = store
            .append(new_event(case_id, entity_id, None), 0)
            .await
            .unwrap();
        let second = store
            .append(new_event(case_id, entity_id, Some(first.event_id)), 1)
            .await
            .unwrap();

        // Assert
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(store.current_version(case_id).await.unwrap(), 2);
        let log = store.read_for_case(case_id).await.unwrap();
        assert_eq!(log, vec![first, second]);
    }

    #[tokio::test]
    async fn test_stale_append_is_rejected_and_retry_at_new_version_succeeds() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (case_id, entity_id) = ids();
        let root = store
            .append(new_event(case_id, entity_id, None), 0)
            .await
            .unwrap();
        store
            .append(new_event(case_id, entity_id, Some(root.event_id)), 1)
            .await
            .unwrap();
        let other_entity = EntityId::from_uuid(Uuid::new_v4());

        // Act
        let err = store
            .append(new_event(case_id, other_entity, None), 1)
            .await
            .unwrap_err();
        let retried = store
            .append(new_event(case_id, other_entity, None), 2)
            .await
            .unwrap();

        // Assert
        match err {
            DomainError::StaleVersion {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected StaleVersion, got {other:?}"),
        }
        assert_eq!(retried.version, 3);
        assert_eq!(store.read_for_case(case_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_append_rejects_event_that_skips_the_chain_tip() {
        let store = InMemoryEventStore::new();
        let (case_id, entity_id) = ids();
        let root = store
            .append(new_event(case_id, entity_id, None), 0)
            .await
            .unwrap();
        store
            .append(new_event(case_id, entity_id, Some(root.event_id)), 1)
            .await
            .unwrap();

        let err = store
            .append(new_event(case_id, entity_id, Some(root.event_id)), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::CausalChainViolation { .. }));
        assert!(!err.is_recoverable());
        assert_eq!(store.current_version(case_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cases_have_independent_version_counters() {
        let store = InMemoryEventStore::new();
        let (case_a, entity_a) = ids();
        let (case_b, entity_b) = ids();

        let a = store.append(new_event(case_a, entity_a, None), 0).await.unwrap();
        let b = store.append(new_event(case_b, entity_b, None), 0).await.unwrap();

        assert_eq!(a.version, 1);
        assert_eq!(b.version, 1);
    }

    #[tokio::test]
    async fn test_read_chain_for_entity_filters_shared_case_log() {
        let store = InMemoryEventStore::new();
        let (case_id, entity_a) = ids();
        let entity_b = EntityId::from_uuid(Uuid::new_v4());
        let a1 = store.append(new_event(case_id, entity_a, None), 0).await.unwrap();
        store.append(new_event(case_id, entity_b, None), 1).await.unwrap();
        let a2 = store
            .append(new_event(case_id, entity_a, Some(a1.event_id)), 2)
            .await
            .unwrap();

        let chain = store.read_chain_for_entity(case_id, entity_a).await.unwrap();

        assert_eq!(chain, vec![a1, a2]);
    }

    #[tokio::test]
    async fn test_reads_are_repeatable_without_intervening_append() {
        let store = InMemoryEventStore::new();
        let (case_id, entity_id) = ids();
        store.append(new_event(case_id, entity_id, None), 0).await.unwrap();

        let first = store.read_for_case(case_id).await.unwrap();
        let second = store.read_for_case(case_id).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_with_same_expected_version_admit_exactly_one() {
        // Arrange
        let store = Arc::new(InMemoryEventStore::new());
        let (case_id, _) = ids();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let entity_id = EntityId::from_uuid(Uuid::new_v4());
            handles.push(tokio::spawn(async move {
                store.append(new_event(case_id, entity_id, None), 0).await
            }));
        }

        // Act
        let mut succeeded = 0;
        let mut stale = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(record) => {
                    assert_eq!(record.version, 1);
                    succeeded += 1;
                }
                Err(err) if err.is_stale_version() => stale += 1,
                Err(other) => panic!("unexpected error {other:?}"),
            }
        }

        // Assert
        assert_eq!(succeeded, 1);
        assert_eq!(stale, 7);
        assert_eq!(store.current_version(case_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_outstanding_events_exclude_processed_ones_per_consumer() {
        // Arrange
        let store = InMemoryEventStore::new();
        let (case_id, entity_id) = ids();
        let first = store.append(new_event(case_id, entity_id, None), 0).await.unwrap();
        let second = store
            .append(new_event(case_id, entity_id, Some(first.event_id)), 1)
            .await
            .unwrap();
        let settlement = ConsumerId::new("settlement");
        let statistics = ConsumerId::new("statistics");
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 11, 0, 0).unwrap();

        // Act
        store
            .mark_processed(&settlement, first.event_id, now)
            .await
            .unwrap();
        store
            .mark_processed(&settlement, first.event_id, now)
            .await
            .unwrap();

        // Assert
        let outstanding = store
            .outstanding_events(&settlement, "test.event.v1")
            .await
            .unwrap();
        assert_eq!(outstanding, vec![second]);
        let other = store
            .outstanding_events(&statistics, "test.event.v1")
            .await
            .unwrap();
        assert_eq!(other.len(), 2);
        assert!(
            store
                .outstanding_events(&settlement, "test.other.v1")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_mark_processed_rejects_unknown_event() {
        let store = InMemoryEventStore::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 11, 0, 0).unwrap();

        let err = store
            .mark_processed(
                &ConsumerId::new("settlement"),
                EventId::from_uuid(Uuid::new_v4()),
                now,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Infrastructure(_)));
    }

    proptest! {
        #[test]
        fn prop_linked_appends_yield_gapless_versions_and_valid_chains(
            picks in proptest::collection::vec(0usize..3, 1..30)
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemoryEventStore::new();
            let case_id = CaseId::from_uuid(Uuid::new_v4());
            let entities: Vec<EntityId> =
                (0..3).map(|_| EntityId::from_uuid(Uuid::new_v4())).collect();
            let mut tips: HashMap<EntityId, EventId> = HashMap::new();

            let versions: Vec<i64> = runtime.block_on(async {
                let mut versions = Vec::new();
                for pick in &picks {
                    let entity_id = entities[*pick];
                    let expected = store.current_version(case_id).await.unwrap();
                    let event = new_event(case_id, entity_id, tips.get(&entity_id).copied());
                    let record = store.append(event, expected).await.unwrap();
                    tips.insert(entity_id, record.event_id);
                    versions.push(record.version);
                }
                versions
            });

            let expected: Vec<i64> = (1..=i64::try_from(picks.len()).unwrap()).collect();
            prop_assert_eq!(versions, expected);
            let log = runtime.block_on(store.read_for_case(case_id)).unwrap();
            prop_assert!(verify_case(case_id, &log).is_ok());
        }
    }
}
