//! Settlement of approved repayment cases.
//!
//! Settlement runs as an [`EventConsumer`] on `repayment.approved.v1`. The
//! approval event is the durable fact; handing the amounts to the payment
//! side happens afterwards and is retried until the gateway accepts it.

use std::sync::Arc;

use async_trait::async_trait;
use case_events_core::consumer::{ConsumerId, EventConsumer};
use case_events_core::error::DomainError;
use case_events_core::event::EventRecord;
use case_events_core::ids::{CaseId, EntityId, EventId};
use case_events_core::replay::replay;
use case_events_core::store::EventStore;
use serde::Serialize;

use crate::domain::aggregates::{RepaymentCase, RepaymentStatus};
use crate::domain::claim_basis::{Decision, Month};
use crate::domain::events::APPROVED_EVENT_TYPE;

/// One month to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementLine {
    /// The month.
    pub month: Month,
    /// Amount to recover for the month.
    pub amount: i64,
}

/// What the payment side needs to recover an approved repayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementRequest {
    /// The owning case.
    pub case_id: CaseId,
    /// The approved repayment case.
    pub entity_id: EntityId,
    /// The approval event. Stable across redeliveries, so the gateway can
    /// use it to deduplicate.
    pub approved_event_id: EventId,
    /// Months judged `Repay`, ascending.
    pub lines: Vec<SettlementLine>,
}

impl SettlementRequest {
    /// Total amount over all lines, saturating at `i64::MAX`.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.lines.iter().map(|l| l.amount).fold(0, i64::saturating_add)
    }
}

/// The external payment side.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Submits a settlement.
    async fn settle(&self, request: &SettlementRequest) -> Result<(), DomainError>;
}

/// Consumer that settles every approved repayment case.
pub struct SettlementConsumer {
    id: ConsumerId,
    store: Arc<dyn EventStore>,
    gateway: Arc<dyn SettlementGateway>,
}

impl std::fmt::Debug for SettlementConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementConsumer")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SettlementConsumer {
    /// Checkpoint key used by default.
    pub const DEFAULT_ID: &'static str = "repayment-settlement";

    /// Creates the consumer with the default checkpoint key.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, gateway: Arc<dyn SettlementGateway>) -> Self {
        Self {
            id: ConsumerId::new(Self::DEFAULT_ID),
            store,
            gateway,
        }
    }

    /// Builds the settlement request for an approval event.
    ///
    /// The sub-case is replayed up to and including the approval, so events
    /// recorded after it do not change the request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EntityNotFound` if the chain is missing,
    /// `DomainError::Validation` if the replayed case is not approved, or
    /// any store error.
    pub async fn request_for(
        &self,
        approval: &EventRecord,
    ) -> Result<SettlementRequest, DomainError> {
        let mut chain = self
            .store
            .read_chain_for_entity(approval.case_id, approval.entity_id)
            .await?;
        chain.retain(|r| r.version <= approval.version);

        let replayed = replay::<RepaymentCase>(approval.entity_id, &chain)?.ok_or(
            DomainError::EntityNotFound {
                case_id: approval.case_id,
                entity_id: approval.entity_id,
            },
        )?;
        if replayed.state.status != RepaymentStatus::Approved
            || replayed.last_event_id != approval.event_id
        {
            return Err(DomainError::Validation(format!(
                "event {} is not the approval of its repayment case",
                approval.event_id
            )));
        }

        let case = &replayed.state;
        let mut lines: Vec<SettlementLine> = case
            .assessments
            .iter()
            .filter(|a| a.decision == Decision::Repay)
            .filter_map(|a| {
                case.claim_basis
                    .amount_for(a.month)
                    .map(|amount| SettlementLine {
                        month: a.month,
                        amount,
                    })
            })
            .collect();
        lines.sort_by_key(|l| l.month);

        Ok(SettlementRequest {
            case_id: approval.case_id,
            entity_id: approval.entity_id,
            approved_event_id: approval.event_id,
            lines,
        })
    }
}

#[async_trait]
impl EventConsumer for SettlementConsumer {
    fn consumer_id(&self) -> &ConsumerId {
        &self.id
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[APPROVED_EVENT_TYPE]
    }

    async fn consume(&self, record: &EventRecord) -> Result<(), DomainError> {
        let request = self.request_for(record).await?;
        tracing::info!(
            case_id = %request.case_id,
            entity_id = %request.entity_id,
            total = request.total(),
            "settling approved repayment"
        );
        self.gateway.settle(&request).await
    }
}
