//! Case Events Repayment: repayment (tilbakekreving) cases.
//!
//! A repayment case is one sub-case of a case. It starts from an externally
//! supplied claim basis, collects a repay/do-not-repay judgement per month,
//! goes to a second case worker for decision and is either approved (which
//! triggers settlement) or sent back for reassessment.

pub mod application;
pub mod domain;
