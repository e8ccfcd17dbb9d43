//! Domain events for repayment cases.

use case_events_core::error::DomainError;
use case_events_core::event::{DomainEvent, decode_payload, encode_payload, unknown_event_type};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::claim_basis::{ClaimBasis, MonthAssessment};

/// Emitted when a repayment case is opened on a claim basis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentCaseOpened {
    /// The claim basis the case is assessed against.
    pub claim_basis: ClaimBasis,
}

/// Emitted when month judgements are recorded. Replaces earlier judgements
/// of the same months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecorded {
    /// The judged months.
    pub assessments: Vec<MonthAssessment>,
}

/// Emitted when the case worker's note changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdated {
    /// The new note; `None` clears it.
    pub note: Option<String>,
}

/// Emitted when an advance notice letter has been sent to the debtor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceNoticeSent {
    /// Identifier of the sent document.
    pub document_id: Uuid,
}

/// Emitted when the case is sent to a second case worker for decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedForDecision {
    /// The submitting case worker.
    pub submitted_by: String,
}

/// Emitted when the decision maker approves the assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentApproved {
    /// The approving decision maker.
    pub approved_by: String,
}

/// Why a decision maker sent a case back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Documentation supporting the assessment is missing.
    MissingDocumentation,
    /// One or more months are judged wrongly.
    IncorrectAssessment,
    /// The claim basis itself is wrong.
    IncorrectClaimBasis,
    /// Anything else; the comment explains.
    Other,
}

/// Emitted when the decision maker sends the case back for reassessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentRejected {
    /// The rejecting decision maker.
    pub rejected_by: String,
    /// Structured reason.
    pub reason: RejectionReason,
    /// Free-text explanation.
    pub comment: String,
}

/// Emitted when the case is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentCaseCancelled {
    /// Who cancelled.
    pub cancelled_by: String,
    /// Why.
    pub reason: String,
}

/// Event type identifier for [`RepaymentCaseOpened`].
pub const CASE_OPENED_EVENT_TYPE: &str = "repayment.case_opened.v1";

/// Event type identifier for [`AssessmentRecorded`].
pub const ASSESSMENT_RECORDED_EVENT_TYPE: &str = "repayment.assessment_recorded.v1";

/// Event type identifier for [`NoteUpdated`].
pub const NOTE_UPDATED_EVENT_TYPE: &str = "repayment.note_updated.v1";

/// Event type identifier for [`AdvanceNoticeSent`].
pub const ADVANCE_NOTICE_SENT_EVENT_TYPE: &str = "repayment.advance_notice_sent.v1";

/// Event type identifier for [`SubmittedForDecision`].
pub const SUBMITTED_FOR_DECISION_EVENT_TYPE: &str = "repayment.submitted_for_decision.v1";

/// Event type identifier for [`RepaymentApproved`].
pub const APPROVED_EVENT_TYPE: &str = "repayment.approved.v1";

/// Event type identifier for [`RepaymentRejected`].
pub const REJECTED_EVENT_TYPE: &str = "repayment.rejected.v1";

/// Event type identifier for [`RepaymentCaseCancelled`].
pub const CANCELLED_EVENT_TYPE: &str = "repayment.cancelled.v1";

/// Common prefix of every repayment event type.
pub const EVENT_TYPE_PREFIX: &str = "repayment.";

/// Events of a repayment case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepaymentEvent {
    /// The case was opened.
    CaseOpened(RepaymentCaseOpened),
    /// Months were judged.
    AssessmentRecorded(AssessmentRecorded),
    /// The note changed.
    NoteUpdated(NoteUpdated),
    /// An advance notice was sent.
    AdvanceNoticeSent(AdvanceNoticeSent),
    /// The case went to decision.
    SubmittedForDecision(SubmittedForDecision),
    /// The decision maker approved.
    Approved(RepaymentApproved),
    /// The decision maker sent the case back.
    Rejected(RepaymentRejected),
    /// The case was cancelled.
    Cancelled(RepaymentCaseCancelled),
}

impl DomainEvent for RepaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::CaseOpened(_) => CASE_OPENED_EVENT_TYPE,
            Self::AssessmentRecorded(_) => ASSESSMENT_RECORDED_EVENT_TYPE,
            Self::NoteUpdated(_) => NOTE_UPDATED_EVENT_TYPE,
            Self::AdvanceNoticeSent(_) => ADVANCE_NOTICE_SENT_EVENT_TYPE,
            Self::SubmittedForDecision(_) => SUBMITTED_FOR_DECISION_EVENT_TYPE,
            Self::Approved(_) => APPROVED_EVENT_TYPE,
            Self::Rejected(_) => REJECTED_EVENT_TYPE,
            Self::Cancelled(_) => CANCELLED_EVENT_TYPE,
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::CaseOpened(e) => encode_payload(e),
            Self::AssessmentRecorded(e) => encode_payload(e),
            Self::NoteUpdated(e) => encode_payload(e),
            Self::AdvanceNoticeSent(e) => encode_payload(e),
            Self::SubmittedForDecision(e) => encode_payload(e),
            Self::Approved(e) => encode_payload(e),
            Self::Rejected(e) => encode_payload(e),
            Self::Cancelled(e) => encode_payload(e),
        }
    }

    fn from_payload(event_type: &str, payload: &serde_json::Value) -> Result<Self, DomainError> {
        Ok(match event_type {
            CASE_OPENED_EVENT_TYPE => Self::CaseOpened(decode_payload(event_type, payload)?),
            ASSESSMENT_RECORDED_EVENT_TYPE => {
                Self::AssessmentRecorded(decode_payload(event_type, payload)?)
            }
            NOTE_UPDATED_EVENT_TYPE => Self::NoteUpdated(decode_payload(event_type, payload)?),
            ADVANCE_NOTICE_SENT_EVENT_TYPE => {
                Self::AdvanceNoticeSent(decode_payload(event_type, payload)?)
            }
            SUBMITTED_FOR_DECISION_EVENT_TYPE => {
                Self::SubmittedForDecision(decode_payload(event_type, payload)?)
            }
            APPROVED_EVENT_TYPE => Self::Approved(decode_payload(event_type, payload)?),
            REJECTED_EVENT_TYPE => Self::Rejected(decode_payload(event_type, payload)?),
            CANCELLED_EVENT_TYPE => Self::Cancelled(decode_payload(event_type, payload)?),
            other => return Err(unknown_event_type(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::claim_basis::{ClaimPeriod, Decision};

    #[test]
    fn test_rejected_payload_uses_snake_case_reason() {
        let event = RepaymentEvent::Rejected(RepaymentRejected {
            rejected_by: "Z990002".to_owned(),
            reason: RejectionReason::MissingDocumentation,
            comment: "documentation missing".to_owned(),
        });

        let payload = event.to_payload().unwrap();

        assert_eq!(event.event_type(), "repayment.rejected.v1");
        assert_eq!(payload["reason"], "missing_documentation");
        assert_eq!(payload["comment"], "documentation missing");
    }

    #[test]
    fn test_case_opened_payload_stores_months_as_text() {
        let event = RepaymentEvent::CaseOpened(RepaymentCaseOpened {
            claim_basis: ClaimBasis {
                claim_basis_id: Uuid::nil(),
                periods: vec![ClaimPeriod {
                    month: "2026-01".parse().unwrap(),
                    gross_overpayment: 2_383,
                }],
            },
        });

        let payload = event.to_payload().unwrap();
        let rebuilt = RepaymentEvent::from_payload(CASE_OPENED_EVENT_TYPE, &payload).unwrap();

        assert_eq!(payload["claim_basis"]["periods"][0]["month"], "2026-01");
        assert_eq!(payload["claim_basis"]["periods"][0]["gross_overpayment"], 2_383);
        assert_eq!(rebuilt, event);
    }

    #[test]
    fn test_assessment_payload_uses_snake_case_decision() {
        let event = RepaymentEvent::AssessmentRecorded(AssessmentRecorded {
            assessments: vec![MonthAssessment {
                month: "2026-02".parse().unwrap(),
                decision: Decision::DoNotRepay,
            }],
        });

        let payload = event.to_payload().unwrap();

        assert_eq!(payload["assessments"][0]["decision"], "do_not_repay");
    }

    #[test]
    fn test_from_payload_rejects_unknown_type() {
        let err = RepaymentEvent::from_payload("repayment.reopened.v1", &serde_json::json!({}))
            .unwrap_err();

        assert!(matches!(err, DomainError::Infrastructure(_)));
    }

    #[test]
    fn test_from_payload_rejects_payload_of_other_type() {
        let err = RepaymentEvent::from_payload(
            APPROVED_EVENT_TYPE,
            &serde_json::json!({"document_id": Uuid::nil()}),
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::Infrastructure(_)));
    }
}
