//! Domain types for the claim form.
//!
//! A user claims an identifier (a username) through a form. Every submission
//! adds entries to an append-only session log: a `Pending` entry while the
//! confirmation email is being sent, then one terminal entry.

use chrono::{DateTime, Utc};
use composable_forms_core::mutation::MutationError;
use composable_forms_core::optimistic::OptimisticView;
use composable_forms_core::request::{Status, SubmissionId, SubmissionRequest, ValidationError};
use composable_forms_core::submission::SubmitReceipt;
use serde::{Deserialize, Serialize};

/// Where a submission's `Pending` entry lives while it is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionMode {
    /// Pending entries are shown through an overlay and never enter the log;
    /// the log only receives terminal entries
    #[default]
    Optimistic,

    /// Pending entries are appended to the log, followed by the terminal entry
    Direct,
}

impl std::str::FromStr for SubmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown submission mode '{other}' (expected optimistic or direct)")),
        }
    }
}

impl std::fmt::Display for SubmissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Optimistic => "optimistic",
            Self::Direct => "direct",
        })
    }
}

/// Input that failed validation, keyed by the submission that carried it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Submission that was refused
    pub submission_id: SubmissionId,
    /// Field errors
    pub error: ValidationError,
}

/// State of the claim form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmissionState {
    /// Append-only session log
    pub requests: Vec<SubmissionRequest>,
    /// `Pending` entries of submissions that have not settled yet
    pub in_flight: Vec<SubmissionRequest>,
    /// How pending entries are shown
    pub mode: SubmissionMode,
    /// Most recent validation failure, cleared by the next accepted submission
    pub rejection: Option<Rejection>,
}

impl SubmissionState {
    /// Creates an empty state using `mode`
    #[must_use]
    pub const fn new(mode: SubmissionMode) -> Self {
        Self {
            requests: Vec::new(),
            in_flight: Vec::new(),
            mode,
            rejection: None,
        }
    }

    /// The list a UI would render, recomputed from the log on every call.
    #[must_use]
    pub fn view(&self) -> OptimisticView<'_, SubmissionRequest> {
        match self.mode {
            SubmissionMode::Optimistic => OptimisticView::new(&self.requests, &self.in_flight),
            SubmissionMode::Direct => OptimisticView::settled(&self.requests),
        }
    }

    /// Owned copy of [`view`](Self::view).
    #[must_use]
    pub fn display_list(&self) -> Vec<SubmissionRequest> {
        self.view().to_vec()
    }

    /// Whether any submission is still in flight
    #[must_use]
    pub fn is_submitting(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// The in-flight entry of a submission
    #[must_use]
    pub fn in_flight_entry(&self, id: &SubmissionId) -> Option<&SubmissionRequest> {
        self.in_flight.iter().find(|r| &r.submission_id == id)
    }

    /// Whether a submission got past validation and was started.
    ///
    /// True while it is in flight and after it settled.
    #[must_use]
    pub fn was_accepted(&self, id: &SubmissionId) -> bool {
        self.in_flight_entry(id).is_some()
            || self.requests.iter().any(|r| &r.submission_id == id)
    }

    /// The newest logged entry for an identifier
    #[must_use]
    pub fn latest_for(&self, identifier: &str) -> Option<&SubmissionRequest> {
        self.requests.iter().rev().find(|r| r.identifier == identifier)
    }

    /// The terminal entry a submission settled with, if it has settled
    #[must_use]
    pub fn outcome_of(&self, id: &SubmissionId) -> Option<&SubmissionRequest> {
        self.requests
            .iter()
            .rev()
            .find(|r| &r.submission_id == id && r.status.is_terminal())
    }

    /// The validation failure recorded for a submission
    #[must_use]
    pub fn rejection_for(&self, id: &SubmissionId) -> Option<&ValidationError> {
        self.rejection
            .as_ref()
            .filter(|r| &r.submission_id == id)
            .map(|r| &r.error)
    }

    /// Number of logged entries with `status`
    #[must_use]
    pub fn count_with(&self, status: Status) -> usize {
        self.requests.iter().filter(|r| r.status == status).count()
    }
}

/// Actions for the claim form
///
/// Commands come from the user; the `Submission*` variants are produced by
/// the submission effect once the email collaborator settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionAction {
    // ========== Commands ==========
    /// Command: Submit raw form input
    Submit {
        /// Caller-chosen correlation ID
        submission_id: SubmissionId,
        /// Raw `identifier` field as typed
        identifier: String,
    },

    /// Command: Submit again for an identifier whose latest entry is `Error`
    Retry {
        /// Correlation ID for the new attempt
        submission_id: SubmissionId,
        /// Identifier to retry
        identifier: String,
    },

    /// Command: Record a review decision for a requested identifier
    Review {
        /// Identifier under review
        identifier: String,
        /// Approve or reject
        approved: bool,
    },

    // ========== Events ==========
    /// Event: The email collaborator accepted the submission
    SubmissionSucceeded {
        /// Submission that settled
        submission_id: SubmissionId,
        /// Collaborator response
        receipt: SubmitReceipt,
    },

    /// Event: The submission failed
    SubmissionFailed {
        /// Submission that settled
        submission_id: SubmissionId,
        /// Normalised failure
        error: MutationError,
    },

    /// Event: Input failed validation; nothing was submitted
    ValidationFailed {
        /// Submission that was refused
        submission_id: SubmissionId,
        /// Field errors
        error: ValidationError,
    },

    /// Event: A review decision was recorded
    Reviewed {
        /// Identifier under review
        identifier: String,
        /// Decision
        approved: bool,
        /// When the decision was made
        at: DateTime<Utc>,
    },
}

impl SubmissionAction {
    /// Submit `identifier` under a fresh correlation ID
    #[must_use]
    pub fn submit(identifier: impl Into<String>) -> Self {
        Self::Submit {
            submission_id: SubmissionId::new(),
            identifier: identifier.into(),
        }
    }

    /// The submission this action settles, if it is a settlement
    #[must_use]
    pub const fn settles(&self) -> Option<&SubmissionId> {
        match self {
            Self::SubmissionSucceeded { submission_id, .. }
            | Self::SubmissionFailed { submission_id, .. } => Some(submission_id),
            _ => None,
        }
    }
}
