//! Simulated confirmation-email delivery.
//!
//! Stands in for a real mail provider: every send waits a fixed latency and
//! then succeeds, unless the configured [`FaultInjector`] decides it fails.

use composable_forms_core::submission::{
    FaultInjector, INJECTED_FAILURE_MESSAGE, SubmissionClient, SubmitError, SubmitFuture,
    SubmitPayload, SubmitReceipt,
};
use std::sync::Arc;
use std::time::Duration;

/// Email client with artificial latency and injected failures
#[derive(Clone)]
pub struct SimulatedEmailClient {
    latency: Duration,
    faults: Arc<dyn FaultInjector>,
}

impl SimulatedEmailClient {
    /// Creates a client that waits `latency` per send and fails whenever
    /// `faults` says so
    #[must_use]
    pub fn new(latency: Duration, faults: Arc<dyn FaultInjector>) -> Self {
        Self { latency, faults }
    }

    /// Configured latency
    #[must_use]
    pub const fn latency(&self) -> Duration {
        self.latency
    }
}

impl std::fmt::Debug for SimulatedEmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEmailClient")
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl SubmissionClient for SimulatedEmailClient {
    fn submit(&self, payload: SubmitPayload) -> SubmitFuture<'_> {
        let fail = self.faults.should_fail(&payload);
        let latency = self.latency;

        Box::pin(async move {
            tracing::trace!(identifier = %payload.identifier, ?latency, fail, "Sending confirmation email");
            tokio::time::sleep(latency).await;

            if fail {
                Err(SubmitError::Rejected(INJECTED_FAILURE_MESSAGE.to_string()))
            } else {
                Ok(SubmitReceipt {
                    identifier: payload.identifier.into_inner(),
                })
            }
        })
    }
}
