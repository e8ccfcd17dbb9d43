//! Case Events Audit entry point.

use std::error::Error;

use case_events_audit::AuditConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to stderr; stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let config = AuditConfig::from_env()?;
    tracing::info!(case_id = %config.case_id, "Starting case audit");

    let report = case_events_audit::run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
