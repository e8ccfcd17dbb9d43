//! Command handlers for repayment cases.
//!
//! Each handler turns one command into at most one event through the
//! [`Engine`]. The transition table is consulted before any business rule,
//! so a command that is illegal in the current state is always reported as
//! `IllegalTransition`, whatever else is wrong with it.

use case_events_core::command::Command;
use case_events_core::engine::{CommandOutcome, Engine, check_transition};
use case_events_core::error::DomainError;
use case_events_core::ids::EntityId;
use tracing::{info, instrument};

use crate::domain::aggregates::RepaymentCase;
use crate::domain::commands::{
    ApproveRepayment, CancelRepaymentCase, OpenRepaymentCase, RecordAssessment, RejectRepayment,
    SendAdvanceNotice, SubmitForDecision, UpdateNote,
};
use crate::domain::events::{
    AdvanceNoticeSent, AssessmentRecorded, NoteUpdated, RepaymentApproved,
    RepaymentCaseCancelled, RepaymentCaseOpened, RepaymentEvent, RepaymentRejected,
    SubmittedForDecision,
};

/// Result of a handled repayment command.
pub type RepaymentOutcome = CommandOutcome<RepaymentCase>;

fn legal(
    entity_id: EntityId,
    state: &RepaymentCase,
    event: RepaymentEvent,
) -> Result<RepaymentEvent, DomainError> {
    check_transition(entity_id, state, &event)?;
    Ok(event)
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Handles the `OpenRepaymentCase` command: validates the claim basis and
/// starts a new repayment sub-case.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an invalid claim basis,
/// `DomainError::StaleVersion` if the case has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id))]
pub async fn handle_open_repayment_case(
    command: &OpenRepaymentCase,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling open_repayment_case command");
    command.claim_basis.validate()?;

    let event = RepaymentEvent::CaseOpened(RepaymentCaseOpened {
        claim_basis: command.claim_basis.clone(),
    });
    engine
        .start::<RepaymentCase>(
            command.case_id,
            &command.context,
            command.expected_version,
            event,
        )
        .await
}

/// Handles the `RecordAssessment` command.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case is editable,
/// `DomainError::Validation` if a month is outside the claim basis or judged
/// twice, `DomainError::StaleVersion` if the case has moved on, or any store
/// error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_record_assessment(
    command: &RecordAssessment,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling record_assessment command");
    let entity_id = command.entity_id;
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::AssessmentRecorded(AssessmentRecorded {
                        assessments: command.assessments.clone(),
                    }),
                )?;
                case.validate_assessments(&command.assessments)?;
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `UpdateNote` command. Writing the note the case already has
/// produces no event.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case is editable,
/// `DomainError::Validation` for a blank note, `DomainError::StaleVersion` if
/// the case has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_update_note(
    command: &UpdateNote,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling update_note command");
    let entity_id = command.entity_id;
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::NoteUpdated(NoteUpdated {
                        note: command.note.clone(),
                    }),
                )?;
                if let Some(note) = &command.note {
                    require_text("note", note)?;
                }
                if case.note == command.note {
                    return Ok(None);
                }
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `SendAdvanceNotice` command. Registering a document that is
/// already registered produces no event.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case is editable,
/// `DomainError::StaleVersion` if the case has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_send_advance_notice(
    command: &SendAdvanceNotice,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling send_advance_notice command");
    let entity_id = command.entity_id;
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::AdvanceNoticeSent(AdvanceNoticeSent {
                        document_id: command.document_id,
                    }),
                )?;
                if case.advance_notices.contains(&command.document_id) {
                    return Ok(None);
                }
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `SubmitForDecision` command.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case is under
/// assessment, `DomainError::Validation` if a claim-basis month is still
/// unjudged, `DomainError::StaleVersion` if the case has moved on, or any
/// store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_submit_for_decision(
    command: &SubmitForDecision,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling submit_for_decision command");
    let entity_id = command.entity_id;
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::SubmittedForDecision(SubmittedForDecision {
                        submitted_by: command.context.actor_identity.clone(),
                    }),
                )?;
                case.ensure_fully_assessed()?;
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `ApproveRepayment` command.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case awaits a
/// decision, `DomainError::Validation` if the approver submitted the case,
/// `DomainError::StaleVersion` if the case has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_approve_repayment(
    command: &ApproveRepayment,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling approve_repayment command");
    let entity_id = command.entity_id;
    let actor = command.context.actor_identity.as_str();
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::Approved(RepaymentApproved {
                        approved_by: actor.to_owned(),
                    }),
                )?;
                case.ensure_not_submitter(actor)?;
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `RejectRepayment` command: sends the case back for
/// reassessment with the reason recorded.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` unless the case awaits a
/// decision, `DomainError::Validation` for a blank comment or if the
/// decision maker submitted the case, `DomainError::StaleVersion` if the case
/// has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_reject_repayment(
    command: &RejectRepayment,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling reject_repayment command");
    let entity_id = command.entity_id;
    let actor = command.context.actor_identity.as_str();
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::Rejected(RepaymentRejected {
                        rejected_by: actor.to_owned(),
                        reason: command.reason,
                        comment: command.comment.clone(),
                    }),
                )?;
                require_text("comment", &command.comment)?;
                case.ensure_not_submitter(actor)?;
                Ok(Some(event))
            },
        )
        .await
}

/// Handles the `CancelRepaymentCase` command.
///
/// # Errors
///
/// Returns `DomainError::IllegalTransition` if the case is already approved
/// or cancelled, `DomainError::Validation` for a blank reason,
/// `DomainError::StaleVersion` if the case has moved on, or any store error.
#[instrument(skip(command, engine), fields(case_id = %command.case_id, entity_id = %command.entity_id))]
pub async fn handle_cancel_repayment_case(
    command: &CancelRepaymentCase,
    engine: &Engine,
) -> Result<RepaymentOutcome, DomainError> {
    info!(correlation_id = %command.correlation_id(), "handling cancel_repayment_case command");
    let entity_id = command.entity_id;
    engine
        .execute::<RepaymentCase, _>(
            command.case_id,
            entity_id,
            &command.context,
            command.expected_version,
            |case| {
                let event = legal(
                    entity_id,
                    case,
                    RepaymentEvent::Cancelled(RepaymentCaseCancelled {
                        cancelled_by: command.context.actor_identity.clone(),
                        reason: command.reason.clone(),
                    }),
                )?;
                require_text("reason", &command.reason)?;
                Ok(Some(event))
            },
        )
        .await
}
