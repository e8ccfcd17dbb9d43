//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use case_events_core::consumer::{ConsumerCheckpoints, ConsumerId};
use case_events_core::error::DomainError;
use case_events_core::event::{EventMetadata, EventRecord, NewEvent};
use case_events_core::ids::{CaseId, EntityId, EventId};
use case_events_core::store::{EventStore, check_append};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{StoreError, is_append_race};
use crate::schema::EVENT_COLUMNS;

/// PostgreSQL-backed event store.
///
/// Each append runs in its own transaction. Concurrent appends to one case
/// both read the same `MAX(version)`; the `UNIQUE (case_id, version)`
/// constraint lets exactly one insert commit and the loser is reported as
/// `StaleVersion`.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Row type for reading events from the database.
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    case_id: Uuid,
    entity_id: Uuid,
    version: i64,
    occurred_at: DateTime<Utc>,
    event_type: String,
    payload: serde_json::Value,
    metadata: serde_json::Value,
    previous_event_id: Option<Uuid>,
}

impl TryFrom<EventRow> for EventRecord {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let metadata: EventMetadata = serde_json::from_value(row.metadata)?;
        Ok(Self {
            event_id: EventId::from_uuid(row.event_id),
            case_id: CaseId::from_uuid(row.case_id),
            entity_id: EntityId::from_uuid(row.entity_id),
            version: row.version,
            occurred_at: row.occurred_at,
            event_type: row.event_type,
            payload: row.payload,
            metadata,
            previous_event_id: row.previous_event_id.map(EventId::from_uuid),
        })
    }
}

fn into_records(rows: Vec<EventRow>) -> Result<Vec<EventRecord>, DomainError> {
    rows.into_iter()
        .map(|row| EventRecord::try_from(row).map_err(DomainError::from))
        .collect()
}

fn db(err: sqlx::Error) -> DomainError {
    StoreError::Database(err).into()
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn current_version(&self, case_id: CaseId) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(version), 0) FROM case_event WHERE case_id = $1",
        )
        .bind(case_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db)
    }

    #[instrument(
        skip(self, event),
        fields(case_id = %event.case_id, entity_id = %event.entity_id, event_type = %event.event_type)
    )]
    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        let metadata = serde_json::to_value(&event.metadata).map_err(StoreError::from)?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(MAX(version), 0) FROM case_event WHERE case_id = $1",
        )
        .bind(event.case_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let tip = sqlx::query_scalar::<_, Uuid>(
            "SELECT event_id FROM case_event \
             WHERE case_id = $1 AND entity_id = $2 \
             ORDER BY version DESC LIMIT 1",
        )
        .bind(event.case_id.as_uuid())
        .bind(event.entity_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db)?;
        check_append(
            &event,
            expected_version,
            current,
            tip.map(EventId::from_uuid),
        )?;

        let version = current + 1;
        let inserted = sqlx::query(
            "INSERT INTO case_event \
             (event_id, case_id, entity_id, version, occurred_at, event_type, payload, metadata, previous_event_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.event_id.as_uuid())
        .bind(event.case_id.as_uuid())
        .bind(event.entity_id.as_uuid())
        .bind(version)
        .bind(event.occurred_at)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&metadata)
        .bind(event.previous_event_id.map(|id| id.as_uuid()))
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_append_race(&err) {
                // A concurrent append on this case committed first.
                drop(tx);
                let actual = self.current_version(event.case_id).await?;
                tracing::warn!(
                    expected = expected_version,
                    actual,
                    "lost append race on case version"
                );
                return Err(DomainError::StaleVersion {
                    case_id: event.case_id,
                    expected: expected_version,
                    actual,
                });
            }
            return Err(db(err));
        }
        tx.commit().await.map_err(db)?;

        tracing::debug!(version, "event appended");
        Ok(event.into_record(version))
    }

    async fn read_for_case(&self, case_id: CaseId) -> Result<Vec<EventRecord>, DomainError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM case_event WHERE case_id = $1 ORDER BY version");
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(case_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        into_records(rows)
    }

    async fn read_chain_for_entity(
        &self,
        case_id: CaseId,
        entity_id: EntityId,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM case_event \
             WHERE case_id = $1 AND entity_id = $2 ORDER BY version"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(case_id.as_uuid())
            .bind(entity_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        into_records(rows)
    }
}

#[async_trait]
impl ConsumerCheckpoints for PgEventStore {
    async fn outstanding_events(
        &self,
        consumer_id: &ConsumerId,
        event_type: &str,
    ) -> Result<Vec<EventRecord>, DomainError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM case_event e \
             WHERE e.event_type = $2 \
             AND NOT EXISTS ( \
                 SELECT 1 FROM event_consumer c \
                 WHERE c.consumer_id = $1 AND c.event_id = e.event_id \
             ) \
             ORDER BY e.case_id, e.version"
        );
        let rows = sqlx::query_as::<_, EventRow>(&sql)
            .bind(consumer_id.as_str())
            .bind(event_type)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        into_records(rows)
    }

    async fn mark_processed(
        &self,
        consumer_id: &ConsumerId,
        event_id: EventId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO event_consumer (consumer_id, event_id, processed_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (consumer_id, event_id) DO NOTHING",
        )
        .bind(consumer_id.as_str())
        .bind(event_id.as_uuid())
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }
}
