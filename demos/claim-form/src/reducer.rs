//! Reducer logic for the claim form.
//!
//! `Submit` validates the input, records a `Pending` entry, and starts one
//! submission effect. The effect runs the email collaborator through the
//! environment's [`MutationRunner`], reports progress to the notification
//! sink, and feeds exactly one settlement action back into the store.

use crate::types::{Rejection, SubmissionAction, SubmissionMode, SubmissionState};
use composable_forms_core::mutation::OverlapPolicy;
use composable_forms_core::notification::{NotificationSink, PromiseMessages};
use composable_forms_core::request::{
    Identifier, IdentifierValidator, Status, SubmissionId, SubmissionRequest, Validator,
};
use composable_forms_core::submission::{SubmissionClient, SubmitPayload, SubmitReceipt};
use composable_forms_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use composable_forms_runtime::metrics::SubmissionMetrics;
use composable_forms_runtime::notify::promise;
use composable_forms_runtime::{MutationCallbacks, MutationRunner};
use std::sync::Arc;

/// Mutation name used in logs and metrics
pub const CLAIM_MUTATION: &str = "claim";

/// User-facing message templates.
///
/// `{identifier}` is replaced everywhere; `{error}` is replaced in the error
/// template with the failure message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimMessages {
    /// Shown while the email is being sent
    pub loading: String,
    /// Shown when the claim was requested
    pub success: String,
    /// Shown when the submission failed
    pub error: String,
    /// Shown when a claim is approved
    pub approved: String,
    /// Shown when a claim is rejected
    pub rejected: String,
}

impl Default for ClaimMessages {
    fn default() -> Self {
        Self {
            loading: "Sending confirmation email for {identifier}...".into(),
            success: "Claim for {identifier} requested".into(),
            error: "{error}".into(),
            approved: "Claim for {identifier} approved".into(),
            rejected: "Claim for {identifier} rejected".into(),
        }
    }
}

impl ClaimMessages {
    /// Promise-style messages for one identifier
    #[must_use]
    pub fn promise_for(&self, identifier: &str) -> PromiseMessages {
        PromiseMessages::new(
            self.loading.replace("{identifier}", identifier),
            self.success.replace("{identifier}", identifier),
            self.error.replace("{identifier}", identifier),
        )
    }

    /// Review outcome message for one identifier
    #[must_use]
    pub fn review_for(&self, identifier: &str, approved: bool) -> String {
        let template = if approved { &self.approved } else { &self.rejected };
        template.replace("{identifier}", identifier)
    }
}

/// Environment dependencies for the claim reducer
#[derive(Clone)]
pub struct SubmissionEnvironment {
    /// Turns the raw `identifier` field into a valid [`Identifier`]
    pub validator: Arc<dyn Validator<str, Valid = Identifier>>,
    /// Sends the confirmation email
    pub client: Arc<dyn SubmissionClient>,
    /// User-facing feedback
    pub notifier: Arc<dyn NotificationSink>,
    /// Timestamps for log entries
    pub clock: Arc<dyn Clock>,
    /// Tracks the pending/error flags of the submission operation
    pub mutation: MutationRunner<SubmitReceipt, SubmitPayload>,
    /// Notification templates
    pub messages: Arc<ClaimMessages>,
}

impl SubmissionEnvironment {
    /// Creates an environment with the default validator, messages, and
    /// overlap policy
    #[must_use]
    pub fn new(
        client: Arc<dyn SubmissionClient>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator: Arc::new(IdentifierValidator::new()),
            client,
            notifier,
            clock,
            mutation: claim_runner(OverlapPolicy::default()),
            messages: Arc::new(ClaimMessages::default()),
        }
    }

    /// Replace the validator
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn Validator<str, Valid = Identifier>>) -> Self {
        self.validator = validator;
        self
    }

    /// Use a fresh mutation runner with `policy`
    #[must_use]
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.mutation = claim_runner(policy);
        self
    }

    /// Replace the notification templates
    #[must_use]
    pub fn with_messages(mut self, messages: ClaimMessages) -> Self {
        self.messages = Arc::new(messages);
        self
    }
}

fn claim_runner(policy: OverlapPolicy) -> MutationRunner<SubmitReceipt, SubmitPayload> {
    let callbacks = MutationCallbacks::new()
        .on_success(|receipt: &SubmitReceipt, payload: &SubmitPayload| {
            tracing::info!(
                submission_id = %payload.submission_id,
                identifier = %receipt.identifier,
                "Claim email sent"
            );
        })
        .on_error(|error, payload: &SubmitPayload| {
            tracing::warn!(
                submission_id = %payload.submission_id,
                identifier = %payload.identifier,
                error = %error,
                "Claim email failed"
            );
        });
    MutationRunner::with_callbacks(CLAIM_MUTATION, policy, callbacks)
}

/// Reducer for the claim form
#[derive(Clone, Debug, Default)]
pub struct SubmissionReducer;

impl SubmissionReducer {
    /// Creates a new `SubmissionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Record the `Pending` entry and build the submission effect
    fn start(
        state: &mut SubmissionState,
        submission_id: SubmissionId,
        identifier: Identifier,
        env: &SubmissionEnvironment,
    ) -> SmallVec<[Effect<SubmissionAction>; 4]> {
        let pending = SubmissionRequest::pending(submission_id, &identifier, env.clock.now());
        if state.mode == SubmissionMode::Direct {
            state.requests.push(pending.clone());
        }
        state.in_flight.push(pending);
        state.rejection = None;

        SubmissionMetrics::record_accepted();
        tracing::debug!(%submission_id, %identifier, mode = %state.mode, "Submission started");

        smallvec![Self::submit_effect(submission_id, identifier, env)]
    }

    /// Run the collaborator through the mutation runner and report the
    /// outcome as a settlement action
    fn submit_effect(
        submission_id: SubmissionId,
        identifier: Identifier,
        env: &SubmissionEnvironment,
    ) -> Effect<SubmissionAction> {
        let messages = env.messages.promise_for(identifier.as_str());
        let payload = SubmitPayload::new(submission_id, identifier);
        let client = Arc::clone(&env.client);
        let notifier = Arc::clone(&env.notifier);
        let runner = env.mutation.clone();

        Effect::Future(Box::pin(async move {
            let operation_payload = payload.clone();
            let operation = move || async move { client.submit(operation_payload).await };

            let outcome = promise(notifier.as_ref(), runner.run(operation, payload), &messages).await;

            Some(match outcome {
                Ok(receipt) => SubmissionAction::SubmissionSucceeded {
                    submission_id,
                    receipt,
                },
                Err(error) => SubmissionAction::SubmissionFailed {
                    submission_id,
                    error,
                },
            })
        }))
    }

    /// Replace a submission's in-flight entry with its terminal entry
    fn settle(
        state: &mut SubmissionState,
        submission_id: SubmissionId,
        status: Status,
        env: &SubmissionEnvironment,
    ) {
        let Some(index) = state
            .in_flight
            .iter()
            .position(|r| r.submission_id == submission_id)
        else {
            tracing::warn!(%submission_id, "Settlement for unknown submission ignored");
            return;
        };

        let pending = state.in_flight.remove(index);
        let now = env.clock.now();
        state.requests.push(pending.settled(status, now));

        let elapsed = (now - pending.recorded_at).to_std().unwrap_or_default();
        SubmissionMetrics::record_settled(status.as_str(), elapsed);
        tracing::debug!(%submission_id, identifier = %pending.identifier, %status, "Submission settled");
    }
}

impl Reducer for SubmissionReducer {
    type State = SubmissionState;
    type Action = SubmissionAction;
    type Environment = SubmissionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            SubmissionAction::Submit {
                submission_id,
                identifier,
            } => match env.validator.validate(&identifier) {
                Ok(valid) => Self::start(state, submission_id, valid, env),
                Err(error) => self.reduce(
                    state,
                    SubmissionAction::ValidationFailed {
                        submission_id,
                        error,
                    },
                    env,
                ),
            },

            SubmissionAction::Retry {
                submission_id,
                identifier,
            } => {
                let retryable = state
                    .latest_for(&identifier)
                    .is_some_and(|r| r.status == Status::Error);
                if !retryable {
                    tracing::warn!(%identifier, "Retry ignored, latest entry is not an error");
                    return SmallVec::new();
                }

                match env.validator.validate(&identifier) {
                    Ok(valid) => Self::start(state, submission_id, valid, env),
                    Err(error) => self.reduce(
                        state,
                        SubmissionAction::ValidationFailed {
                            submission_id,
                            error,
                        },
                        env,
                    ),
                }
            },

            SubmissionAction::Review {
                identifier,
                approved,
            } => {
                let requested = state
                    .latest_for(&identifier)
                    .is_some_and(|r| r.status == Status::Requested);
                if !requested {
                    tracing::warn!(%identifier, "Review ignored, claim is not awaiting review");
                    return SmallVec::new();
                }

                let at = env.clock.now();
                let mut effects = self.reduce(
                    state,
                    SubmissionAction::Reviewed {
                        identifier: identifier.clone(),
                        approved,
                        at,
                    },
                    env,
                );

                let notifier = Arc::clone(&env.notifier);
                let message = env.messages.review_for(&identifier, approved);
                effects.push(Effect::fire_and_forget(async move {
                    notifier.success(&message);
                }));
                effects
            },

            // ========== Events ==========
            SubmissionAction::SubmissionSucceeded { submission_id, .. } => {
                Self::settle(state, submission_id, Status::Requested, env);
                SmallVec::new()
            },

            SubmissionAction::SubmissionFailed { submission_id, .. } => {
                Self::settle(state, submission_id, Status::Error, env);
                SmallVec::new()
            },

            SubmissionAction::ValidationFailed {
                submission_id,
                error,
            } => {
                SubmissionMetrics::record_invalid();
                tracing::debug!(%submission_id, %error, "Submission refused");
                state.rejection = Some(Rejection {
                    submission_id,
                    error,
                });
                SmallVec::new()
            },

            SubmissionAction::Reviewed {
                identifier,
                approved,
                at,
            } => {
                if let Some(latest) = state.latest_for(&identifier) {
                    let status = if approved {
                        Status::Approved
                    } else {
                        Status::Rejected
                    };
                    let entry = latest.settled(status, at);
                    state.requests.push(entry);
                }
                SmallVec::new()
            },
        }
    }
}
