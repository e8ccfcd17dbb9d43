//! Case Events Audit: verifies and replays one case log.
//!
//! The binary reads a case from PostgreSQL, checks its version sequence and
//! causal chains, replays every repayment sub-case and prints the result as
//! JSON. The library half holds the configuration and the report so they
//! can be tested against any `EventStore`.

pub mod config;
pub mod error;
pub mod report;

use case_events_store::PgEventStore;
use case_events_store::schema::MIGRATOR;

pub use config::AuditConfig;
pub use error::AppError;
pub use report::{AuditReport, audit_case};

/// Connects to the configured database, applies migrations if asked to and
/// audits the configured case.
///
/// # Errors
///
/// Returns `AppError::Store` if the database cannot be reached,
/// `AppError::Migration` if migrations fail, or any error of [`audit_case`].
pub async fn run(config: &AuditConfig) -> Result<AuditReport, AppError> {
    let pool = config.store.connect().await?;
    if config.run_migrations {
        MIGRATOR.run(&pool).await?;
        tracing::info!("Migrations applied");
    }
    let store = PgEventStore::new(pool);
    audit_case(&store, config.case_id).await
}
