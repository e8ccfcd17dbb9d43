//! Application layer: command and query handlers, settlement consumer.

pub mod command_handlers;
pub mod query_handlers;
pub mod settlement;
