//! Query handlers for repayment cases.
//!
//! Queries replay sub-cases from the case log and return read-only views.
//! They never write.

use case_events_core::error::DomainError;
use case_events_core::event::EventRecord;
use case_events_core::ids::{CaseId, EntityId};
use case_events_core::replay::{ReplayedState, replay};
use case_events_core::store::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{DecisionEntry, Rejection, RepaymentCase, RepaymentStatus};
use crate::domain::claim_basis::{Decision, Month};
use crate::domain::events::EVENT_TYPE_PREFIX;

/// One claim-basis month with its judgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthView {
    /// The month.
    pub month: Month,
    /// Gross overpayment of the month.
    pub gross_overpayment: i64,
    /// The judgement, if the month has been assessed.
    pub decision: Option<Decision>,
}

/// Read-only view of a repayment case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepaymentCaseView {
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment sub-case.
    pub entity_id: EntityId,
    /// Lifecycle position.
    pub status: RepaymentStatus,
    /// Source identifier of the claim basis.
    pub claim_basis_id: Uuid,
    /// Every claim-basis month, ascending.
    pub months: Vec<MonthView>,
    /// Sum over the months judged `Repay`.
    pub total_to_repay: i64,
    /// The case worker's note.
    pub note: Option<String>,
    /// Sent advance notices.
    pub advance_notices: Vec<Uuid>,
    /// The rejection being worked on, if any.
    pub rejection: Option<Rejection>,
    /// Decision history, oldest first.
    pub history: Vec<DecisionEntry>,
    /// Case version of the sub-case's latest event.
    pub last_version: i64,
    /// Current version of the whole case when the view was read.
    pub case_version: i64,
}

impl RepaymentCaseView {
    fn from_replayed(replayed: &ReplayedState<RepaymentCase>, case_version: i64) -> Self {
        let case = &replayed.state;
        let mut months: Vec<MonthView> = case
            .claim_basis
            .periods
            .iter()
            .map(|p| MonthView {
                month: p.month,
                gross_overpayment: p.gross_overpayment,
                decision: case.decision_for(p.month),
            })
            .collect();
        months.sort_by_key(|m| m.month);

        Self {
            case_id: replayed.case_id,
            entity_id: replayed.entity_id,
            status: case.status,
            claim_basis_id: case.claim_basis.claim_basis_id,
            months,
            total_to_repay: case.amount_to_repay(),
            note: case.note.clone(),
            advance_notices: case.advance_notices.clone(),
            rejection: case.rejection.clone(),
            history: case.history.clone(),
            last_version: replayed.last_version,
            case_version,
        }
    }
}

fn case_version(events: &[EventRecord]) -> i64 {
    events.last().map_or(0, |r| r.version)
}

/// Retrieves one repayment case.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` if the sub-case has no events, or
/// `DomainError::Infrastructure` if reading or decoding fails.
///
/// # Panics
///
/// Panics if the stored chain violates the replay invariants.
pub async fn get_repayment_case(
    case_id: CaseId,
    entity_id: EntityId,
    store: &dyn EventStore,
) -> Result<RepaymentCaseView, DomainError> {
    let events = store.read_for_case(case_id).await?;
    let replayed = replay::<RepaymentCase>(entity_id, &events)?
        .ok_or(DomainError::EntityNotFound { case_id, entity_id })?;
    Ok(RepaymentCaseView::from_replayed(
        &replayed,
        case_version(&events),
    ))
}

/// Lists every repayment case of a case, in the order they were opened.
///
/// Sub-cases of other kinds sharing the case log are skipped.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if reading or decoding fails.
///
/// # Panics
///
/// Panics if a stored chain violates the replay invariants.
pub async fn list_repayment_cases(
    case_id: CaseId,
    store: &dyn EventStore,
) -> Result<Vec<RepaymentCaseView>, DomainError> {
    let events = store.read_for_case(case_id).await?;
    let version = case_version(&events);
    let roots = events
        .iter()
        .filter(|r| r.previous_event_id.is_none() && r.event_type.starts_with(EVENT_TYPE_PREFIX))
        .map(|r| r.entity_id);

    let mut views = Vec::new();
    for entity_id in roots {
        if let Some(replayed) = replay::<RepaymentCase>(entity_id, &events)? {
            views.push(RepaymentCaseView::from_replayed(&replayed, version));
        }
    }
    Ok(views)
}
