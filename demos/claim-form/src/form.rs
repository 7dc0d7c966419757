//! Request/response facade over the claim store.
//!
//! [`ClaimForm`] is what a UI talks to: it sends commands to the store,
//! waits for the submission's effects to finish, and reports how that
//! submission ended.

use crate::reducer::{SubmissionEnvironment, SubmissionReducer};
use crate::types::{SubmissionAction, SubmissionMode, SubmissionState};
use composable_forms_core::mutation::MutationState;
use composable_forms_core::request::{Status, SubmissionId, SubmissionRequest, ValidationError};
use composable_forms_runtime::{Store, StoreError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Store type driven by the form
pub type ClaimStore =
    Store<SubmissionState, SubmissionAction, SubmissionEnvironment, SubmissionReducer>;

/// Capacity of the store's action broadcast
const BROADCAST_CAPACITY: usize = 256;

/// How long to wait for a settlement that is already in the broadcast buffer
const SETTLEMENT_GRACE: Duration = Duration::from_secs(1);

/// Errors from the facade itself; submission failures are outcomes, not errors
#[derive(Debug, Error)]
pub enum FormError {
    /// The store refused the command or stopped observing results
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Effects finished without recording a terminal entry
    #[error("submission {0} finished without settling")]
    Unsettled(SubmissionId),
}

/// How one submission ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// Validation refused the input; nothing was submitted
    Invalid {
        /// Field errors
        error: ValidationError,
    },
    /// The claim was requested
    Requested {
        /// Terminal log entry
        entry: SubmissionRequest,
    },
    /// The submission failed
    Failed {
        /// Terminal log entry
        entry: SubmissionRequest,
        /// Failure message as shown to the user
        message: String,
    },
    /// The command was ignored (for example, a retry of a claim that did not fail)
    Ignored,
}

impl SubmitOutcome {
    /// Status of the terminal entry, if one was recorded
    #[must_use]
    pub const fn status(&self) -> Option<Status> {
        match self {
            Self::Requested { entry } | Self::Failed { entry, .. } => Some(entry.status),
            Self::Invalid { .. } | Self::Ignored => None,
        }
    }
}

/// What the reducer did with a submit or retry command
enum Admission {
    Invalid(ValidationError),
    Accepted,
    Ignored,
}

/// Claim form facade
#[derive(Clone)]
pub struct ClaimForm {
    store: ClaimStore,
}

impl ClaimForm {
    /// Creates a form with an empty log
    #[must_use]
    pub fn new(mode: SubmissionMode, environment: SubmissionEnvironment) -> Self {
        Self {
            store: Store::with_broadcast_capacity(
                SubmissionState::new(mode),
                SubmissionReducer::new(),
                environment,
                BROADCAST_CAPACITY,
            ),
        }
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &ClaimStore {
        &self.store
    }

    /// Submit raw input and wait until it settles.
    ///
    /// # Errors
    ///
    /// Returns [`FormError`] if the store is shutting down or the submission
    /// never recorded a terminal entry.
    pub async fn submit(&self, identifier: impl Into<String>) -> Result<SubmitOutcome, FormError> {
        let submission_id = SubmissionId::new();
        let action = SubmissionAction::Submit {
            submission_id,
            identifier: identifier.into(),
        };
        self.run(action, submission_id).await
    }

    /// Submit again for an identifier whose latest entry is `Error`.
    ///
    /// # Errors
    ///
    /// See [`ClaimForm::submit`].
    pub async fn retry(&self, identifier: impl Into<String>) -> Result<SubmitOutcome, FormError> {
        let submission_id = SubmissionId::new();
        let action = SubmissionAction::Retry {
            submission_id,
            identifier: identifier.into(),
        };
        self.run(action, submission_id).await
    }

    /// Start a submission without waiting for it to settle.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Store`] if the store is shutting down.
    pub async fn start(&self, identifier: impl Into<String>) -> Result<SubmissionId, FormError> {
        let submission_id = SubmissionId::new();
        self.store
            .send(SubmissionAction::Submit {
                submission_id,
                identifier: identifier.into(),
            })
            .await?;
        Ok(submission_id)
    }

    /// Record a review decision for a requested claim.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Store`] if the store is shutting down.
    pub async fn review(
        &self,
        identifier: impl Into<String>,
        approved: bool,
    ) -> Result<(), FormError> {
        let mut handle = self
            .store
            .send(SubmissionAction::Review {
                identifier: identifier.into(),
                approved,
            })
            .await?;
        handle.wait().await;
        Ok(())
    }

    async fn run(
        &self,
        action: SubmissionAction,
        submission_id: SubmissionId,
    ) -> Result<SubmitOutcome, FormError> {
        let mut results = self.store.subscribe_actions();
        let mut handle = self.store.send(action).await?;

        // Decided in one read; a fast submission may already have settled
        let admission = self
            .store
            .state(|s| match s.rejection_for(&submission_id) {
                Some(error) => Admission::Invalid(error.clone()),
                None if s.was_accepted(&submission_id) => Admission::Accepted,
                None => Admission::Ignored,
            })
            .await;

        match admission {
            Admission::Invalid(error) => return Ok(SubmitOutcome::Invalid { error }),
            Admission::Ignored => return Ok(SubmitOutcome::Ignored),
            Admission::Accepted => {},
        }

        // The submission effect only completes after its settlement was reduced
        handle.wait().await;

        let settlement = ClaimStore::wait_for(
            &mut results,
            |action| action.settles() == Some(&submission_id),
            SETTLEMENT_GRACE,
        )
        .await?;

        let entry = self
            .store
            .state(|s| s.outcome_of(&submission_id).cloned())
            .await
            .ok_or(FormError::Unsettled(submission_id))?;

        Ok(match settlement {
            SubmissionAction::SubmissionFailed { error, .. } => SubmitOutcome::Failed {
                entry,
                message: error.message().to_string(),
            },
            _ => SubmitOutcome::Requested { entry },
        })
    }

    /// Wait until no submission is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if submissions are still running after
    /// `timeout`.
    pub async fn settle_all(&self, timeout: Duration) -> Result<(), FormError> {
        let mut revisions = self.store.watch_revisions();
        tokio::time::timeout(timeout, async {
            while self.store.state(SubmissionState::is_submitting).await {
                if revisions.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
        .map_err(|_| FormError::Store(StoreError::Timeout))
    }

    /// The list a UI would render right now
    pub async fn display_list(&self) -> Vec<SubmissionRequest> {
        self.store.state(SubmissionState::display_list).await
    }

    /// The authoritative append-only log
    pub async fn log(&self) -> Vec<SubmissionRequest> {
        self.store.state(|s| s.requests.clone()).await
    }

    /// Current flags of the submission mutation
    #[must_use]
    pub fn mutation_state(&self) -> MutationState {
        self.store.environment().mutation.state()
    }

    /// Subscribe to the submission mutation's flags
    #[must_use]
    pub fn watch_mutation(&self) -> watch::Receiver<MutationState> {
        self.store.environment().mutation.subscribe()
    }

    /// Subscribe to state revisions; recompute the display list on each change
    #[must_use]
    pub fn watch_revisions(&self) -> watch::Receiver<u64> {
        self.store.watch_revisions()
    }

    /// Stop accepting commands and wait for running submissions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), FormError> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }
}
