//! The audit report of one case.

use case_events_core::chain::{ChainSummary, verify_case};
use case_events_core::ids::CaseId;
use case_events_core::store::EventStore;
use case_events_repayment::application::query_handlers::{
    RepaymentCaseView, list_repayment_cases,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::AppError;

/// Integrity summary and replayed repayment cases of one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// The audited case.
    pub case_id: CaseId,
    /// Current case version.
    pub version: i64,
    /// Every sub-case chain, in order of its first event.
    pub chains: Vec<ChainSummary>,
    /// Every repayment sub-case, replayed.
    pub repayment_cases: Vec<RepaymentCaseView>,
}

/// Verifies and replays one case.
///
/// Chains are verified before anything is replayed, so a corrupt log is
/// reported as an integrity violation instead of aborting the replay.
///
/// # Errors
///
/// Returns `AppError::Integrity` for a broken version sequence or causal
/// chain, or `AppError::Domain` if reading or decoding fails.
#[instrument(skip(store), fields(case_id = %case_id))]
pub async fn audit_case(
    store: &dyn EventStore,
    case_id: CaseId,
) -> Result<AuditReport, AppError> {
    let events = store.read_for_case(case_id).await?;
    let integrity = verify_case(case_id, &events)?;
    let repayment_cases = list_repayment_cases(case_id, store).await?;

    info!(
        version = integrity.version,
        chains = integrity.chains.len(),
        repayment_cases = repayment_cases.len(),
        "case verified"
    );
    Ok(AuditReport {
        case_id,
        version: integrity.version,
        chains: integrity.chains,
        repayment_cases,
    })
}
