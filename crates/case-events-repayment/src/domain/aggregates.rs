//! The repayment case aggregate.
//!
//! Lifecycle:
//!
//! ```text
//! Created --assess--> UnderAssessment --submit--> SubmittedForDecision
//!                          ^                           |      |
//!                          +--------- reject ----------+      +--approve--> Approved
//!
//! Created | UnderAssessment | SubmittedForDecision --cancel--> Cancelled
//! ```
//!
//! Notes and advance notices may be recorded while the case is editable.

use case_events_core::aggregate::{Aggregate, TransitionError};
use case_events_core::error::DomainError;
use case_events_core::event::DomainEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::claim_basis::{ClaimBasis, Decision, Month, MonthAssessment, validate_assessments};
use crate::domain::events::{RejectionReason, RepaymentEvent};

/// Where a repayment case is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepaymentStatus {
    /// Opened on a claim basis, nothing judged yet.
    Created,
    /// Months are being judged; editable.
    UnderAssessment,
    /// Waiting for the decision maker.
    SubmittedForDecision,
    /// Approved. Terminal.
    Approved,
    /// Cancelled. Terminal.
    Cancelled,
}

impl RepaymentStatus {
    /// State name used in errors and views.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::UnderAssessment => "UnderAssessment",
            Self::SubmittedForDecision => "SubmittedForDecision",
            Self::Approved => "Approved",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether no further event is accepted.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled)
    }
}

/// A decision maker's rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Who rejected.
    pub rejected_by: String,
    /// Structured reason.
    pub reason: RejectionReason,
    /// Free-text explanation.
    pub comment: String,
}

/// One step in the decision history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionEntry {
    /// Sent to decision.
    Submitted {
        /// The submitting case worker.
        by: String,
    },
    /// Approved.
    Approved {
        /// The decision maker.
        by: String,
    },
    /// Sent back.
    Rejected(Rejection),
}

/// State of one repayment sub-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepaymentCase {
    /// Lifecycle position.
    pub status: RepaymentStatus,
    /// The claim basis the case was opened on.
    pub claim_basis: ClaimBasis,
    /// Current judgements, ascending by month.
    pub assessments: Vec<MonthAssessment>,
    /// The case worker's note.
    pub note: Option<String>,
    /// Documents of advance notices sent so far.
    pub advance_notices: Vec<Uuid>,
    /// The rejection the case is currently being reworked after, if any.
    pub rejection: Option<Rejection>,
    /// Every submit, approve and reject, oldest first.
    pub history: Vec<DecisionEntry>,
}

impl RepaymentCase {
    /// The judgement of `month`, if any.
    #[must_use]
    pub fn decision_for(&self, month: Month) -> Option<Decision> {
        self.assessments
            .iter()
            .find(|a| a.month == month)
            .map(|a| a.decision)
    }

    /// Who submitted the case for the pending decision.
    #[must_use]
    pub fn submitted_by(&self) -> Option<&str> {
        self.history.iter().rev().find_map(|entry| match entry {
            DecisionEntry::Submitted { by } => Some(by.as_str()),
            _ => None,
        })
    }

    /// Sum of gross overpayment over the months judged `Repay`.
    ///
    /// Saturates at `i64::MAX`, which a validated claim basis never reaches.
    #[must_use]
    pub fn amount_to_repay(&self) -> i64 {
        self.assessments
            .iter()
            .filter(|a| a.decision == Decision::Repay)
            .filter_map(|a| self.claim_basis.amount_for(a.month))
            .fold(0, i64::saturating_add)
    }

    /// Validates new judgements against the claim basis.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for months outside the basis,
    /// months judged twice or an empty batch.
    pub fn validate_assessments(&self, assessments: &[MonthAssessment]) -> Result<(), DomainError> {
        validate_assessments(&self.claim_basis, assessments)
    }

    /// Checks that every month of the claim basis has a judgement.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` naming the first unjudged month.
    pub fn ensure_fully_assessed(&self) -> Result<(), DomainError> {
        match self
            .claim_basis
            .months()
            .into_iter()
            .find(|m| self.decision_for(*m).is_none())
        {
            Some(month) => Err(DomainError::Validation(format!(
                "{month} has not been assessed"
            ))),
            None => Ok(()),
        }
    }

    /// Enforces that the decision maker is not the case worker who submitted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `actor` submitted the case.
    pub fn ensure_not_submitter(&self, actor: &str) -> Result<(), DomainError> {
        if self.submitted_by() == Some(actor) {
            return Err(DomainError::Validation(
                "the decision maker must not be the case worker who submitted the case".into(),
            ));
        }
        Ok(())
    }

    fn merge_assessments(&mut self, assessments: &[MonthAssessment]) {
        for new in assessments {
            match self.assessments.iter_mut().find(|a| a.month == new.month) {
                Some(existing) => existing.decision = new.decision,
                None => self.assessments.push(*new),
            }
        }
        self.assessments.sort_by_key(|a| a.month);
    }

    fn reject_pair(&self, event: &RepaymentEvent) -> TransitionError {
        TransitionError {
            state: self.status.as_str(),
            event_type: event.event_type(),
        }
    }
}

impl Aggregate for RepaymentCase {
    type Event = RepaymentEvent;

    const AGGREGATE_TYPE: &'static str = "repayment_case";

    fn create(event: &RepaymentEvent) -> Result<Self, TransitionError> {
        match event {
            RepaymentEvent::CaseOpened(opened) => Ok(Self {
                status: RepaymentStatus::Created,
                claim_basis: opened.claim_basis.clone(),
                assessments: Vec::new(),
                note: None,
                advance_notices: Vec::new(),
                rejection: None,
                history: Vec::new(),
            }),
            other => Err(TransitionError {
                state: "none",
                event_type: other.event_type(),
            }),
        }
    }

    fn apply(mut self, event: &RepaymentEvent) -> Result<Self, TransitionError> {
        use RepaymentStatus::{Approved, Cancelled, Created, SubmittedForDecision, UnderAssessment};

        match (self.status, event) {
            (Created | UnderAssessment, RepaymentEvent::AssessmentRecorded(e)) => {
                self.merge_assessments(&e.assessments);
                self.status = UnderAssessment;
            }
            (Created | UnderAssessment, RepaymentEvent::NoteUpdated(e)) => {
                self.note.clone_from(&e.note);
            }
            (Created | UnderAssessment, RepaymentEvent::AdvanceNoticeSent(e)) => {
                self.advance_notices.push(e.document_id);
            }
            (UnderAssessment, RepaymentEvent::SubmittedForDecision(e)) => {
                self.history.push(DecisionEntry::Submitted {
                    by: e.submitted_by.clone(),
                });
                self.rejection = None;
                self.status = SubmittedForDecision;
            }
            (SubmittedForDecision, RepaymentEvent::Approved(e)) => {
                self.history.push(DecisionEntry::Approved {
                    by: e.approved_by.clone(),
                });
                self.status = Approved;
            }
            (SubmittedForDecision, RepaymentEvent::Rejected(e)) => {
                let rejection = Rejection {
                    rejected_by: e.rejected_by.clone(),
                    reason: e.reason,
                    comment: e.comment.clone(),
                };
                self.history.push(DecisionEntry::Rejected(rejection.clone()));
                self.rejection = Some(rejection);
                self.status = UnderAssessment;
            }
            (Created | UnderAssessment | SubmittedForDecision, RepaymentEvent::Cancelled(_)) => {
                self.status = Cancelled;
            }
            (
                Created | UnderAssessment | SubmittedForDecision | Approved | Cancelled,
                RepaymentEvent::CaseOpened(_),
            )
            | (
                Created,
                RepaymentEvent::SubmittedForDecision(_)
                | RepaymentEvent::Approved(_)
                | RepaymentEvent::Rejected(_),
            )
            | (UnderAssessment, RepaymentEvent::Approved(_) | RepaymentEvent::Rejected(_))
            | (
                SubmittedForDecision,
                RepaymentEvent::AssessmentRecorded(_)
                | RepaymentEvent::NoteUpdated(_)
                | RepaymentEvent::AdvanceNoticeSent(_)
                | RepaymentEvent::SubmittedForDecision(_),
            )
            | (
                Approved | Cancelled,
                RepaymentEvent::AssessmentRecorded(_)
                | RepaymentEvent::NoteUpdated(_)
                | RepaymentEvent::AdvanceNoticeSent(_)
                | RepaymentEvent::SubmittedForDecision(_)
                | RepaymentEvent::Approved(_)
                | RepaymentEvent::Rejected(_)
                | RepaymentEvent::Cancelled(_),
            ) => return Err(self.reject_pair(event)),
        }
        Ok(self)
    }

    fn state_name(&self) -> &'static str {
        self.status.as_str()
    }
}
