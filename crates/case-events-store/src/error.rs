//! Store-level errors and their mapping into `DomainError`.

use case_events_core::error::DomainError;
use thiserror::Error;

use crate::schema::APPEND_RACE_CONSTRAINTS;

/// Errors raised by the store backends before they reach the domain.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection, query or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Event metadata could not be (de)serialized.
    #[error("metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The in-memory store's lock was poisoned by a panicking writer.
    #[error("in-memory store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

/// Whether a database error means another append on the case committed first.
pub(crate) fn is_append_race(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                && db
                    .constraint()
                    .is_some_and(|name| APPEND_RACE_CONSTRAINTS.contains(&name))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_maps_to_infrastructure() {
        let err: DomainError = StoreError::Config("DATABASE_URL must be set".into()).into();

        match err {
            DomainError::Infrastructure(msg) => assert!(msg.contains("DATABASE_URL")),
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn test_row_not_found_is_not_an_append_race() {
        assert!(!is_append_race(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_append_race_constraints_exist_in_the_schema() {
        let schema = include_str!("../../../migrations/0001_create_case_event.sql");

        for name in APPEND_RACE_CONSTRAINTS {
            assert!(schema.contains(name), "{name} is not declared");
        }
        assert!(
            !APPEND_RACE_CONSTRAINTS.contains(&"case_event_pkey"),
            "a reused event id is not a lost race"
        );
    }
}
