//! Shared primitives for all Rust crates in aclgraph.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type used across aclgraph crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Tenant identifier used as the partition key for every graph and queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Creates a random tenant identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a tenant identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a tenant identifier from its hyphenated string form.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim())
            .map(Self)
            .map_err(|error| AppError::Validation(format!("invalid tenant id '{value}': {error}")))
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Malformed command or query parameters.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced user, group, role or permission does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Edge or permission already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Edge would introduce a cycle into the group hierarchy.
    #[error("cycle rejected: {0}")]
    CycleRejected(String),

    /// Command type is not known to the translator.
    #[error("unsupported command: {0}")]
    UnsupportedCommand(String),

    /// Tenant runtime is stopped, shutting down or not hydrated.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the classified error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CycleRejected(_) => ErrorKind::CycleRejected,
            Self::UnsupportedCommand(_) => ErrorKind::UnsupportedCommand,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Stable error classification reported back to command callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed parameters.
    ValidationFailed,
    /// Missing entity or permission.
    NotFound,
    /// Duplicate edge or permission.
    Conflict,
    /// Group hierarchy cycle.
    CycleRejected,
    /// Unknown command type.
    UnsupportedCommand,
    /// Runtime not accepting work.
    Unavailable,
    /// Unclassified failure.
    Internal,
}

impl ErrorKind {
    /// Returns the stable error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::CycleRejected => "cycle_rejected",
            Self::UnsupportedCommand => "unsupported_command",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }

    /// Returns whether the kind is raised by pre-mutation validation.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed
                | Self::NotFound
                | Self::Conflict
                | Self::CycleRejected
                | Self::UnsupportedCommand
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, ErrorKind, NonEmptyString, TenantId};

    #[test]
    fn non_empty_string_rejects_whitespace() {
        let result = NonEmptyString::new("   ");
        assert!(result.is_err());
    }

    #[test]
    fn tenant_id_formats_as_uuid() {
        let tenant_id = TenantId::new();
        assert_eq!(tenant_id.to_string().len(), 36);
    }

    #[test]
    fn tenant_id_parse_roundtrips_display() {
        let tenant_id = TenantId::new();
        let parsed = TenantId::parse(tenant_id.to_string().as_str());
        assert_eq!(parsed, Ok(tenant_id));
        assert!(TenantId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn error_kinds_expose_stable_codes() {
        let error = AppError::CycleRejected("group 2 is an ancestor of group 1".to_owned());
        assert_eq!(error.kind(), ErrorKind::CycleRejected);
        assert_eq!(error.kind().as_str(), "cycle_rejected");
        assert!(error.kind().is_rejection());
        assert!(!AppError::Internal("boom".to_owned()).kind().is_rejection());
    }
}
