//! # Composable Forms Testing
//!
//! Testing utilities for reducers, stores, and submission flows.
//!
//! This crate provides:
//! - Mock implementations of environment collaborators
//! - A fluent `ReducerTest` harness with effect assertions
//! - Property-based testing strategies for form input
//!
//! ## Example
//!
//! ```ignore
//! use composable_forms_testing::{RecordingNotifier, ScriptedSubmissionClient, test_clock};
//!
//! #[tokio::test]
//! async fn rejected_submission_notifies() {
//!     let client = ScriptedSubmissionClient::new().then_reject("Operation failed");
//!     let notifier = RecordingNotifier::new();
//!     let form = ClaimForm::new(environment(client, notifier.clone(), test_clock()));
//!
//!     form.submit("bob").await?;
//!
//!     assert_eq!(notifier.errors(), vec!["Operation failed".to_string()]);
//! }
//! ```

use chrono::{DateTime, Utc};
use composable_forms_core::environment::Clock;


pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations of environment collaborators.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use composable_forms_core::notification::{Notification, NotificationKind, NotificationSink};
    use composable_forms_core::submission::{
        SubmissionClient, SubmitError, SubmitFuture, SubmitPayload, SubmitReceipt,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_forms_testing::mocks::FixedClock;
    /// use composable_forms_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which cannot happen.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notification sink that records everything it receives.
    ///
    /// Clones share the same record, so a test can keep one handle and pass
    /// another into the environment.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingNotifier {
        received: Arc<Mutex<Vec<Notification>>>,
    }

    impl RecordingNotifier {
        /// Create an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every notification, in delivery order.
        #[must_use]
        pub fn notifications(&self) -> Vec<Notification> {
            lock(&self.received).clone()
        }

        /// Messages of one kind, in delivery order.
        #[must_use]
        pub fn messages(&self, kind: NotificationKind) -> Vec<String> {
            lock(&self.received)
                .iter()
                .filter(|n| n.kind == kind)
                .map(|n| n.message.clone())
                .collect()
        }

        /// Success messages.
        #[must_use]
        pub fn successes(&self) -> Vec<String> {
            self.messages(NotificationKind::Success)
        }

        /// Error messages.
        #[must_use]
        pub fn errors(&self) -> Vec<String> {
            self.messages(NotificationKind::Error)
        }

        /// Forget everything recorded so far.
        pub fn clear(&self) {
            lock(&self.received).clear();
        }

        fn record(&self, kind: NotificationKind, message: &str) {
            lock(&self.received).push(Notification::new(kind, message));
        }
    }

    impl NotificationSink for RecordingNotifier {
        fn success(&self, message: &str) {
            self.record(NotificationKind::Success, message);
        }

        fn error(&self, message: &str) {
            self.record(NotificationKind::Error, message);
        }

        fn loading(&self, message: &str) {
            self.record(NotificationKind::Loading, message);
        }
    }

    /// Outcome of one scripted call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Scripted {
        /// Resolve with a receipt echoing the identifier
        Accept,
        /// Reject with the given message
        Reject(String),
        /// Panic instead of returning a value
        Panic,
    }

    #[derive(Debug, Default)]
    struct Script {
        queue: VecDeque<(Duration, Scripted)>,
        calls: Vec<SubmitPayload>,
    }

    /// Submission client that replays a queue of scripted outcomes.
    ///
    /// Once the queue is empty every call gets the fallback outcome
    /// ([`Scripted::Accept`] unless changed). Clones share the script.
    #[derive(Debug, Clone)]
    pub struct ScriptedSubmissionClient {
        script: Arc<Mutex<Script>>,
        fallback: Scripted,
        latency: Duration,
    }

    impl Default for ScriptedSubmissionClient {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScriptedSubmissionClient {
        /// Client that accepts everything immediately.
        #[must_use]
        pub fn new() -> Self {
            Self {
                script: Arc::new(Mutex::new(Script::default())),
                fallback: Scripted::Accept,
                latency: Duration::ZERO,
            }
        }

        /// Client whose fallback rejects with `message`.
        #[must_use]
        pub fn rejecting(message: impl Into<String>) -> Self {
            Self::new().otherwise(Scripted::Reject(message.into()))
        }

        /// Outcome for calls beyond the scripted queue.
        #[must_use]
        pub fn otherwise(mut self, outcome: Scripted) -> Self {
            self.fallback = outcome;
            self
        }

        /// Latency applied to fallback calls and to `then_*` entries added
        /// after this call.
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        /// Queue an outcome with an explicit latency.
        #[must_use]
        pub fn then(self, latency: Duration, outcome: Scripted) -> Self {
            lock(&self.script).queue.push_back((latency, outcome));
            self
        }

        /// Queue a success.
        #[must_use]
        pub fn then_accept(self) -> Self {
            let latency = self.latency;
            self.then(latency, Scripted::Accept)
        }

        /// Queue a rejection.
        #[must_use]
        pub fn then_reject(self, message: impl Into<String>) -> Self {
            let latency = self.latency;
            self.then(latency, Scripted::Reject(message.into()))
        }

        /// Queue a panic.
        #[must_use]
        pub fn then_panic(self) -> Self {
            let latency = self.latency;
            self.then(latency, Scripted::Panic)
        }

        /// Payloads received so far, in call order.
        #[must_use]
        pub fn calls(&self) -> Vec<SubmitPayload> {
            lock(&self.script).calls.clone()
        }

        /// Number of calls received so far.
        #[must_use]
        pub fn call_count(&self) -> usize {
            lock(&self.script).calls.len()
        }
    }

    impl SubmissionClient for ScriptedSubmissionClient {
        fn submit(&self, payload: SubmitPayload) -> SubmitFuture<'_> {
            let (latency, outcome) = {
                let mut script = lock(&self.script);
                script.calls.push(payload.clone());
                script
                    .queue
                    .pop_front()
                    .unwrap_or_else(|| (self.latency, self.fallback.clone()))
            };

            Box::pin(async move {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                match outcome {
                    Scripted::Accept => Ok(SubmitReceipt {
                        identifier: payload.identifier.into_inner(),
                    }),
                    Scripted::Reject(message) => Err(SubmitError::Rejected(message)),
                    #[allow(clippy::panic)]
                    Scripted::Panic => panic!("scripted panic for {}", payload.identifier),
                }
            })
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    /// Install a test-friendly tracing subscriber.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing strategies for form input.
pub mod properties {
    use proptest::prelude::*;

    /// Identifiers that pass the default validator.
    pub fn valid_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{2,15}"
    }

    /// Identifiers shorter than the default minimum length, possibly padded
    /// with whitespace.
    pub fn short_identifier() -> impl Strategy<Value = String> {
        ("[a-z]{0,2}", " {0,3}").prop_map(|(core, pad)| format!("{pad}{core}{pad}"))
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingNotifier, Scripted, ScriptedSubmissionClient, test_clock};
