//! Case Events Core: the event-sourced case engine.
//!
//! Every case ("sak") owns one append-only, versioned log of immutable
//! events. Sub-cases ("behandlinger") inside a case share that version
//! counter but keep their own causal chain through `previous_event_id`.
//!
//! This crate defines the event model, the replayer, the `EventStore`
//! contract with its optimistic concurrency rule and the generic command
//! scaffolding. It contains no infrastructure code.

pub mod aggregate;
pub mod chain;
pub mod clock;
pub mod command;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod event;
pub mod ids;
pub mod replay;
pub mod store;
