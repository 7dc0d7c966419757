//! Prometheus metrics for the store, mutations, and submissions.
//!
//! Counters are emitted through the `metrics` facade wherever the work
//! happens. Installing a recorder is optional; without one every macro call
//! is a no-op.
//!
//! # Example
//!
//! ```rust,no_run
//! use composable_forms_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let recorder = MetricsRecorder::install()?;
//! // ... run submissions ...
//! if let Some(snapshot) = recorder.render() {
//!     println!("{snapshot}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// In-process Prometheus recorder.
///
/// Holds the handle used to render a text snapshot.
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    /// A recorder that is already installed is not an error; the returned
    /// value then has no handle and [`render`](Self::render) yields `None`.
    pub fn install() -> Result<Self, MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                describe_metrics();
                tracing::debug!("Prometheus recorder installed");
                Ok(Self {
                    handle: Some(handle),
                })
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self { handle: None })
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every metric emitted by the workspace.
pub fn describe_metrics() {
    describe_counter!("store.commands.total", "Actions sent to a store");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside a reducer"
    );
    describe_counter!("store.effects.executed", "Effects executed, by type");
    describe_counter!("store.feedback.total", "Effect-produced actions fed back into a store");
    describe_counter!("store.shutdown.initiated", "Store shutdowns started");
    describe_counter!("store.shutdown.completed", "Store shutdowns that drained in time");
    describe_counter!("store.shutdown.timeout", "Store shutdowns that timed out");
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected during shutdown"
    );

    describe_counter!("mutation.started", "Mutation invocations started");
    describe_counter!("mutation.succeeded", "Mutation invocations that succeeded");
    describe_counter!("mutation.failed", "Mutation invocations that failed");

    describe_counter!("submission.accepted", "Submissions that passed validation");
    describe_counter!("submission.invalid", "Submissions rejected by validation");
    describe_counter!("submission.settled", "Submissions settled, by outcome");
    describe_histogram!(
        "submission.duration_seconds",
        "Time from submit to settlement"
    );
}

/// Submission lifecycle recorder.
pub struct SubmissionMetrics;

impl SubmissionMetrics {
    /// A submission passed validation and started.
    pub fn record_accepted() {
        counter!("submission.accepted").increment(1);
    }

    /// A submission was rejected by validation.
    pub fn record_invalid() {
        counter!("submission.invalid").increment(1);
    }

    /// A submission settled with `outcome` after `duration`.
    pub fn record_settled(outcome: &'static str, duration: Duration) {
        counter!("submission.settled", "outcome" => outcome).increment(1);
        histogram!("submission.duration_seconds").record(duration.as_secs_f64());
    }
}
