//! Commands for repayment cases.

use case_events_core::command::{Command, CommandContext};
use case_events_core::ids::{CaseId, EntityId};
use uuid::Uuid;

use crate::domain::claim_basis::{ClaimBasis, MonthAssessment};
use crate::domain::events::RejectionReason;

macro_rules! impl_command {
    ($name:ident, $command_type:literal) => {
        impl Command for $name {
            fn command_type(&self) -> &'static str {
                $command_type
            }

            fn case_id(&self) -> CaseId {
                self.case_id
            }

            fn context(&self) -> &CommandContext {
                &self.context
            }

            fn expected_version(&self) -> i64 {
                self.expected_version
            }
        }
    };
}

/// Command to open a repayment case on a claim basis.
#[derive(Debug, Clone)]
pub struct OpenRepaymentCase {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The case the repayment case belongs to.
    pub case_id: CaseId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// The claim basis to assess.
    pub claim_basis: ClaimBasis,
}

impl_command!(OpenRepaymentCase, "repayment.open_case");

/// Command to record month judgements.
#[derive(Debug, Clone)]
pub struct RecordAssessment {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// The judgements to record.
    pub assessments: Vec<MonthAssessment>,
}

impl_command!(RecordAssessment, "repayment.record_assessment");

/// Command to set or clear the case worker's note.
#[derive(Debug, Clone)]
pub struct UpdateNote {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// The new note; `None` clears it.
    pub note: Option<String>,
}

impl_command!(UpdateNote, "repayment.update_note");

/// Command to register that an advance notice has been sent.
#[derive(Debug, Clone)]
pub struct SendAdvanceNotice {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// The sent document.
    pub document_id: Uuid,
}

impl_command!(SendAdvanceNotice, "repayment.send_advance_notice");

/// Command to send the case to decision. The submitter is the acting user.
#[derive(Debug, Clone)]
pub struct SubmitForDecision {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
}

impl_command!(SubmitForDecision, "repayment.submit_for_decision");

/// Command to approve the submitted assessment.
#[derive(Debug, Clone)]
pub struct ApproveRepayment {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
}

impl_command!(ApproveRepayment, "repayment.approve");

/// Command to send the case back for reassessment.
#[derive(Debug, Clone)]
pub struct RejectRepayment {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// Structured reason.
    pub reason: RejectionReason,
    /// Free-text explanation.
    pub comment: String,
}

impl_command!(RejectRepayment, "repayment.reject");

/// Command to cancel the case.
#[derive(Debug, Clone)]
pub struct CancelRepaymentCase {
    /// Caller identity and correlation.
    pub context: CommandContext,
    /// The owning case.
    pub case_id: CaseId,
    /// The repayment case.
    pub entity_id: EntityId,
    /// The case version the caller last observed.
    pub expected_version: i64,
    /// Why the case is cancelled.
    pub reason: String,
}

impl_command!(CancelRepaymentCase, "repayment.cancel");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exposes_context_and_expected_version() {
        let correlation_id = Uuid::new_v4();
        let case_id = CaseId::from_uuid(Uuid::new_v4());
        let command = SubmitForDecision {
            context: CommandContext::new("Z990001", correlation_id),
            case_id,
            entity_id: EntityId::from_uuid(Uuid::new_v4()),
            expected_version: 3,
        };

        assert_eq!(command.command_type(), "repayment.submit_for_decision");
        assert_eq!(command.case_id(), case_id);
        assert_eq!(command.expected_version(), 3);
        assert_eq!(command.correlation_id(), correlation_id);
        assert_eq!(command.context().actor_identity, "Z990001");
    }
}
