//! Test stores: mock `EventStore` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use case_events_core::error::DomainError;
use case_events_core::event::{EventRecord, NewEvent};
use case_events_core::ids::CaseId;
use case_events_core::store::EventStore;

/// An event store that serves a fixed history and records every append.
///
/// Appends always succeed and are assigned the next version after the
/// history and earlier appends; they are not checked against
/// `expected_version`. Use [`RecordingEventStore::rejecting`] to simulate a
/// concurrent writer instead.
#[derive(Debug)]
pub struct RecordingEventStore {
    history: Vec<EventRecord>,
    appended: Mutex<Vec<(NewEvent, i64)>>,
    reject_with_version: Option<i64>,
}

impl RecordingEventStore {
    /// Creates a store whose reads return `history` (plus accepted appends).
    #[must_use]
    pub fn new(history: Vec<EventRecord>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
            reject_with_version: None,
        }
    }

    /// Creates a store that rejects every append with `StaleVersion`,
    /// reporting `actual` as the current version. Attempts are still recorded.
    #[must_use]
    pub fn rejecting(history: Vec<EventRecord>, actual: i64) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
            reject_with_version: Some(actual),
        }
    }

    /// Returns every attempted append with its expected version.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(NewEvent, i64)> {
        self.appended.lock().unwrap().clone()
    }

    fn all_records(&self) -> Vec<EventRecord> {
        let appended = self.appended.lock().unwrap();
        let mut records = self.history.clone();
        if self.reject_with_version.is_none() {
            let mut version = records.last().map_or(0, |r| r.version);
            for (event, _) in appended.iter() {
                version += 1;
                records.push(event.clone().into_record(version));
            }
        }
        records
    }
}

#[async_trait]
impl EventStore for RecordingEventStore {
    async fn current_version(&self, case_id: CaseId) -> Result<i64, DomainError> {
        Ok(self
            .all_records()
            .iter()
            .filter(|r| r.case_id == case_id)
            .map(|r| r.version)
            .max()
            .unwrap_or(0))
    }

    async fn append(
        &self,
        event: NewEvent,
        expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        if let Some(actual) = self.reject_with_version {
            let case_id = event.case_id;
            self.appended
                .lock()
                .unwrap()
                .push((event, expected_version));
            return Err(DomainError::StaleVersion {
                case_id,
                expected: expected_version,
                actual,
            });
        }
        let version = self.all_records().last().map_or(0, |r| r.version) + 1;
        self.appended
            .lock()
            .unwrap()
            .push((event.clone(), expected_version));
        Ok(event.into_record(version))
    }

    async fn read_for_case(&self, case_id: CaseId) -> Result<Vec<EventRecord>, DomainError> {
        let mut records = self.all_records();
        records.retain(|r| r.case_id == case_id);
        Ok(records)
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

#[async_trait]
impl EventStore for FailingEventStore {
    async fn current_version(&self, _case_id: CaseId) -> Result<i64, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append(
        &self,
        _event: NewEvent,
        _expected_version: i64,
    ) -> Result<EventRecord, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn read_for_case(&self, _case_id: CaseId) -> Result<Vec<EventRecord>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
