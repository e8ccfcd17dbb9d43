//! Repayment domain: value types, events, the aggregate and its commands.

pub mod aggregates;
pub mod claim_basis;
pub mod commands;
pub mod events;
