//! Asynchronous submission collaborator and fault injection hooks.
//!
//! # Dyn Compatibility
//!
//! [`SubmissionClient`] returns `Pin<Box<dyn Future>>` instead of using
//! `async fn` so that environments can hold it as `Arc<dyn SubmissionClient>`
//! and effects can capture it.

use crate::request::{Identifier, SubmissionId};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use thiserror::Error;

/// Message produced by injected faults.
pub const INJECTED_FAILURE_MESSAGE: &str = "Operation failed";

/// What gets sent to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPayload {
    /// Submission being performed
    pub submission_id: SubmissionId,
    /// Validated identifier
    pub identifier: Identifier,
}

impl SubmitPayload {
    /// Create a payload.
    #[must_use]
    pub const fn new(submission_id: SubmissionId, identifier: Identifier) -> Self {
        Self {
            submission_id,
            identifier,
        }
    }
}

/// Successful response from the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Identifier the collaborator acknowledged
    pub identifier: String,
}

/// Failure reported by the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SubmitError {
    /// The collaborator rejected the request
    #[error("{0}")]
    Rejected(String),

    /// The collaborator could not be reached
    #[error("submission service unavailable: {0}")]
    Unavailable(String),
}

/// Result type returned by [`SubmissionClient::submit`].
pub type SubmitFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SubmitReceipt, SubmitError>> + Send + 'a>>;

/// Performs the actual submission (e.g. sends a confirmation email).
pub trait SubmissionClient: Send + Sync {
    /// Submit a payload.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmitError`] when the collaborator rejects the request.
    fn submit(&self, payload: SubmitPayload) -> SubmitFuture<'_>;
}

/// Decides whether a submission should fail on purpose.
///
/// Replaces hard-coded randomness so tests can pick deterministic outcomes.
pub trait FaultInjector: Send + Sync {
    /// Whether this payload's submission should fail.
    fn should_fail(&self, payload: &SubmitPayload) -> bool;
}

/// Never inject a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&self, _payload: &SubmitPayload) -> bool {
        false
    }
}

/// Always inject a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFail;

impl FaultInjector for AlwaysFail {
    fn should_fail(&self, _payload: &SubmitPayload) -> bool {
        true
    }
}

/// Inject faults with a fixed probability.
#[derive(Debug)]
pub struct RandomFaults {
    rate: f64,
    rng: Mutex<rand::rngs::StdRng>,
}

impl RandomFaults {
    /// Fail with probability `rate`, clamped to `[0, 1]`.
    #[must_use]
    pub fn new(rate: f64) -> Self {
        use rand::SeedableRng;
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(rand::rngs::StdRng::from_entropy()),
        }
    }

    /// Deterministic variant for reproducible runs.
    #[must_use]
    pub fn seeded(rate: f64, seed: u64) -> Self {
        use rand::SeedableRng;
        Self {
            rate: rate.clamp(0.0, 1.0),
            rng: Mutex::new(rand::rngs::StdRng::seed_from_u64(seed)),
        }
    }

    /// Configured failure probability.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }
}

impl FaultInjector for RandomFaults {
    fn should_fail(&self, _payload: &SubmitPayload) -> bool {
        use rand::Rng;
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(self.rate),
            // A poisoned lock only means another caller panicked mid-draw
            Err(poisoned) => poisoned.into_inner().gen_bool(self.rate),
        }
    }
}

/// Fail only for identifiers in a fixed list.
#[derive(Debug, Clone, Default)]
pub struct FailIdentifiers {
    identifiers: Vec<String>,
}

impl FailIdentifiers {
    /// Create from a list of identifiers.
    #[must_use]
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }
}

impl FaultInjector for FailIdentifiers {
    fn should_fail(&self, payload: &SubmitPayload) -> bool {
        self.identifiers
            .iter()
            .any(|id| id == payload.identifier.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use crate::request::{IdentifierValidator, Validator};

    fn payload(identifier: &str) -> SubmitPayload {
        let identifier = IdentifierValidator::new().validate(identifier).unwrap();
        SubmitPayload::new(SubmissionId::new(), identifier)
    }

    #[test]
    fn fixed_injectors() {
        assert!(!NoFaults.should_fail(&payload("alice")));
        assert!(AlwaysFail.should_fail(&payload("alice")));
    }

    #[test]
    fn random_faults_extremes() {
        let never = RandomFaults::seeded(0.0, 7);
        let always = RandomFaults::seeded(1.0, 7);
        for _ in 0..50 {
            assert!(!never.should_fail(&payload("alice")));
            assert!(always.should_fail(&payload("alice")));
        }
    }

    #[test]
    fn random_faults_rate_is_clamped() {
        assert!((RandomFaults::seeded(3.5, 1).rate() - 1.0).abs() < f64::EPSILON);
        assert!(RandomFaults::seeded(-1.0, 1).rate().abs() < f64::EPSILON);
    }

    #[test]
    fn seeded_faults_are_reproducible() {
        let a = RandomFaults::seeded(0.3, 42);
        let b = RandomFaults::seeded(0.3, 42);
        let p = payload("alice");
        let left: Vec<_> = (0..32).map(|_| a.should_fail(&p)).collect();
        let right: Vec<_> = (0..32).map(|_| b.should_fail(&p)).collect();
        assert_eq!(left, right);
    }

    #[test]
    fn fail_identifiers_matches_exactly() {
        let faults = FailIdentifiers::new(["bob"]);
        assert!(faults.should_fail(&payload("bob")));
        assert!(!faults.should_fail(&payload("bobby")));
    }

    #[test]
    fn rejected_error_displays_message() {
        assert_eq!(
            SubmitError::Rejected(INJECTED_FAILURE_MESSAGE.into()).to_string(),
            "Operation failed"
        );
    }
}
