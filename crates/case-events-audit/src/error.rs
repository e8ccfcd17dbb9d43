//! Audit tool error types.

use case_events_core::chain::IntegrityViolation;
use case_events_core::error::DomainError;
use case_events_store::StoreError;
use thiserror::Error;

/// Startup and runtime errors of the audit tool.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The database could not be configured or reached.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Reading or replaying the case failed.
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    /// The case log breaks a version or causal-chain invariant.
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),
}

#[cfg(test)]
mod tests {
    use case_events_core::ids::{CaseId, EventId};
    use uuid::Uuid;

    use super::*;

    #[test]
    fn test_store_config_error_is_shown_unwrapped() {
        let err = AppError::from(StoreError::Config(
            "DATABASE_URL environment variable must be set".into(),
        ));

        assert_eq!(
            err.to_string(),
            "configuration error: DATABASE_URL environment variable must be set"
        );
    }

    #[test]
    fn test_integrity_violation_is_prefixed() {
        let err = AppError::from(IntegrityViolation::ForeignCase {
            event_id: EventId::from_uuid(Uuid::nil()),
            found: CaseId::from_uuid(Uuid::nil()),
        });

        assert!(err.to_string().starts_with("integrity violation: event "));
    }
}
