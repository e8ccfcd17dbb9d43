//! Case Events Store: `EventStore` backends.
//!
//! [`PgEventStore`] persists case logs in PostgreSQL, [`InMemoryEventStore`]
//! keeps them in process. Both enforce the same append contract and both
//! keep downstream consumer checkpoints.

pub mod config;
pub mod error;
pub mod in_memory;
pub mod pg_event_store;
pub mod schema;

pub use config::StoreConfig;
pub use error::StoreError;
pub use in_memory::InMemoryEventStore;
pub use pg_event_store::PgEventStore;
