//! Command abstractions.
//!
//! Actor and correlation data travel as an explicit `CommandContext` on every
//! command. Nothing is read from ambient or thread-local state.

use uuid::Uuid;

use crate::event::EventMetadata;
use crate::ids::CaseId;

/// Who issued a command, and on behalf of which request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    /// Identity of the acting user or system.
    pub actor_identity: String,
    /// Correlation ID for tracing this command through the system.
    pub correlation_id: Uuid,
    /// Roles the caller holds.
    pub caller_roles: Vec<String>,
}

impl CommandContext {
    /// Creates a context with no roles.
    #[must_use]
    pub fn new(actor_identity: impl Into<String>, correlation_id: Uuid) -> Self {
        Self {
            actor_identity: actor_identity.into(),
            correlation_id,
            caller_roles: Vec::new(),
        }
    }

    /// Adds the caller's roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.caller_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Builds the metadata stored on every event this command produces.
    #[must_use]
    pub fn to_metadata(&self) -> EventMetadata {
        EventMetadata {
            actor_identity: self.actor_identity.clone(),
            correlation_id: self.correlation_id,
            caller_roles: self.caller_roles.clone(),
        }
    }
}

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// The case the command mutates.
    fn case_id(&self) -> CaseId;

    /// Actor and correlation data of the caller.
    fn context(&self) -> &CommandContext;

    /// The case version the caller last observed.
    fn expected_version(&self) -> i64;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid {
        self.context().correlation_id
    }
}
