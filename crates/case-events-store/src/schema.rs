//! Event store database schema.
//!
//! Tables are created by the SQL migrations in the workspace `migrations/`
//! directory:
//!
//! - `case_event`: the append-only log. `UNIQUE (case_id, version)` settles
//!   concurrent appends; partial unique indexes allow one root per entity
//!   and one successor per event.
//! - `event_consumer`: `(consumer_id, event_id)` pairs already handled by a
//!   downstream consumer.

use sqlx::migrate::Migrator;

/// Embedded migrations for the event store.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Columns of `case_event`, in `EventRow` order.
pub(crate) const EVENT_COLUMNS: &str = "event_id, case_id, entity_id, version, occurred_at, \
     event_type, payload, metadata, previous_event_id";

/// Unique constraints a concurrent append on the same case can trip.
///
/// Any other unique violation, such as a reused `event_id`, is not a lost
/// race and must not be reported as a stale version.
pub(crate) const APPEND_RACE_CONSTRAINTS: [&str; 3] = [
    "case_event_case_id_version_key",
    "case_event_previous_event_id_key",
    "case_event_entity_root_key",
];
