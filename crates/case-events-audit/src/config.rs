//! Audit tool configuration read from the environment.

use case_events_core::ids::CaseId;
use case_events_store::StoreConfig;
use uuid::Uuid;

use crate::error::AppError;

/// What to audit and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    /// Database settings.
    pub store: StoreConfig,
    /// `AUDIT_CASE_ID`, required.
    pub case_id: CaseId,
    /// `AUDIT_RUN_MIGRATIONS`, default `false`.
    pub run_migrations: bool,
}

impl AuditConfig {
    /// Builds the configuration from a key lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `AUDIT_CASE_ID` is missing or not a
    /// UUID, or `AUDIT_RUN_MIGRATIONS` is not a boolean, and
    /// `AppError::Store` if the database settings are invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = StoreConfig::from_lookup(&lookup)?;
        let raw_case_id = lookup("AUDIT_CASE_ID").ok_or_else(|| {
            AppError::Config("AUDIT_CASE_ID environment variable must be set".into())
        })?;
        let case_id = Uuid::parse_str(raw_case_id.trim())
            .map(CaseId::from_uuid)
            .map_err(|e| AppError::Config(format!("AUDIT_CASE_ID must be a UUID: {e}")))?;
        let run_migrations = match lookup("AUDIT_RUN_MIGRATIONS").as_deref().map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw.parse().map_err(|_| {
                AppError::Config(format!(
                    "AUDIT_RUN_MIGRATIONS must be true or false, got {raw:?}"
                ))
            })?,
        };
        Ok(Self {
            store,
            case_id,
            run_migrations,
        })
    }

    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`AuditConfig::from_lookup`].
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
