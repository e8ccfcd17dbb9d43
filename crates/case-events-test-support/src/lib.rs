//! Shared test doubles for the case event engine.

mod clock;
mod ids;
mod store;

pub use clock::FixedClock;
pub use ids::SequenceIds;
pub use store::{FailingEventStore, RecordingEventStore};
