//! Submission request model and input validation.
//!
//! A [`SubmissionRequest`] is one entry of the append-only session log kept by
//! a submission orchestrator. Each submission contributes a `Pending` entry
//! (directly or through an optimistic overlay) followed by exactly one
//! terminal entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum identifier length accepted by [`IdentifierValidator`].
pub const MIN_IDENTIFIER_LEN: usize = 3;

/// Correlates the entries produced by one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    /// Generate a new submission ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a submission entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Submitted, waiting for the asynchronous operation to settle
    Pending,

    /// Operation succeeded; the claim was requested
    Requested,

    /// Operation failed
    Error,

    /// A requested claim was approved
    Approved,

    /// A requested claim was rejected
    Rejected,
}

impl Status {
    /// Whether this status ends a submission's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Requested => "requested",
            Self::Error => "error",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated identifier (username, email handle, ...).
///
/// Only constructible through a [`Validator`], so holding one means the
/// input already passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One entry of the submission log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Submission this entry belongs to
    pub submission_id: SubmissionId,

    /// The identifier that was submitted
    pub identifier: String,

    /// Status recorded by this entry
    pub status: Status,

    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

impl SubmissionRequest {
    /// Create a new log entry.
    #[must_use]
    pub fn new(
        submission_id: SubmissionId,
        identifier: impl Into<String>,
        status: Status,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            submission_id,
            identifier: identifier.into(),
            status,
            recorded_at,
        }
    }

    /// Create a `Pending` entry for a fresh submission.
    #[must_use]
    pub fn pending(
        submission_id: SubmissionId,
        identifier: &Identifier,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self::new(submission_id, identifier.as_str(), Status::Pending, recorded_at)
    }

    /// Derive the next entry of the same submission with a new status.
    ///
    /// The receiver is left untouched; the log only ever grows.
    #[must_use]
    pub fn settled(&self, status: Status, recorded_at: DateTime<Utc>) -> Self {
        Self::new(self.submission_id, self.identifier.clone(), status, recorded_at)
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Name of the offending field
    pub field: String,

    /// Human readable message
    pub message: String,
}

impl FieldError {
    /// Create a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation failed for one or more fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("validation failed: {}", join_errors(.errors))]
pub struct ValidationError {
    /// Every field-level failure, in the order they were found
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    /// Build from a single field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Messages reported for a given field.
    pub fn messages_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.field == field)
            .map(|e| e.message.as_str())
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turns raw form values into a typed, valid value.
///
/// Orchestrators must not start a submission when this returns an error.
pub trait Validator<Raw: ?Sized>: Send + Sync {
    /// The typed value produced by a successful validation
    type Valid;

    /// Validate raw input.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every failing field.
    fn validate(&self, raw: &Raw) -> Result<Self::Valid, ValidationError>;
}

/// Validates the `identifier` form field.
///
/// Leading and trailing whitespace is trimmed; the rest must be at least
/// `min_len` characters long.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierValidator {
    min_len: usize,
}

impl IdentifierValidator {
    /// Field name reported in validation errors.
    pub const FIELD: &'static str = "identifier";

    /// Validator with the default minimum length.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min_len: MIN_IDENTIFIER_LEN,
        }
    }

    /// Validator with a custom minimum length.
    #[must_use]
    pub const fn with_min_len(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator<str> for IdentifierValidator {
    type Valid = Identifier;

    fn validate(&self, raw: &str) -> Result<Identifier, ValidationError> {
        let trimmed = raw.trim();

        if trimmed.chars().count() < self.min_len {
            return Err(ValidationError::single(
                Self::FIELD,
                format!("must be at least {} characters", self.min_len),
            ));
        }

        Ok(Identifier(trimmed.to_string()))
    }
}
