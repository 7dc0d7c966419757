//! Mutation runner.
//!
//! [`MutationRunner`] executes an asynchronous operation and exposes
//! `{is_pending, is_error}` through a [`StateCell`]:
//!
//! - on invocation: `is_pending = true`, `is_error = false`
//! - on success: `is_pending = false`, then `on_success(result, variables)`
//! - on failure: `is_pending = false`, `is_error = true`, then
//!   `on_error(error, variables)`
//!
//! Nothing is retried. A failed operation runs again only when the caller
//! invokes [`MutationRunner::run`] again.
//!
//! The operation runs on its own tokio task so that a panic inside it is
//! contained and reported as [`MutationError::Unknown`].

use crate::cell::StateCell;
use composable_forms_core::mutation::{MutationError, MutationState, MutationTrace, OverlapPolicy};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Instrument;

type SuccessCallback<T, V> = Box<dyn Fn(&T, &V) + Send + Sync>;
type ErrorCallback<V> = Box<dyn Fn(&MutationError, &V) + Send + Sync>;

/// Callbacks invoked after every settlement.
pub struct MutationCallbacks<T, V> {
    on_success: Option<SuccessCallback<T, V>>,
    on_error: Option<ErrorCallback<V>>,
}

impl<T, V> MutationCallbacks<T, V> {
    /// No callbacks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            on_success: None,
            on_error: None,
        }
    }

    /// Set the success callback.
    #[must_use]
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&T, &V) + Send + Sync + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&MutationError, &V) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl<T, V> Default for MutationCallbacks<T, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, V> std::fmt::Debug for MutationCallbacks<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCallbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Runs a named mutation and tracks its flags.
///
/// Cloning the runner shares the flags, the invocation counter and the
/// callbacks.
pub struct MutationRunner<T, V> {
    name: Arc<str>,
    policy: OverlapPolicy,
    state: StateCell<MutationState>,
    invocations: Arc<AtomicU64>,
    latest: Arc<AtomicU64>,
    callbacks: Arc<MutationCallbacks<T, V>>,
}

impl<T, V> Clone for MutationRunner<T, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            policy: self.policy,
            state: self.state.clone(),
            invocations: Arc::clone(&self.invocations),
            latest: Arc::clone(&self.latest),
            callbacks: Arc::clone(&self.callbacks),
        }
    }
}

impl<T, V> std::fmt::Debug for MutationRunner<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationRunner")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("state", &self.state.get())
            .field("invocations", &self.invocations.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T, V> MutationRunner<T, V>
where
    T: Send + 'static,
    V: Send + Sync,
{
    /// Runner with the default overlap policy and no callbacks.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_callbacks(name, OverlapPolicy::default(), MutationCallbacks::new())
    }

    /// Runner with an explicit overlap policy and callbacks.
    #[must_use]
    pub fn with_callbacks(
        name: impl Into<Arc<str>>,
        policy: OverlapPolicy,
        callbacks: MutationCallbacks<T, V>,
    ) -> Self {
        Self {
            name: name.into(),
            policy,
            state: StateCell::new(MutationState::IDLE),
            invocations: Arc::new(AtomicU64::new(0)),
            latest: Arc::new(AtomicU64::new(0)),
            callbacks: Arc::new(callbacks),
        }
    }

    /// Name used in logs and metrics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured overlap policy.
    #[must_use]
    pub const fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Current flags.
    #[must_use]
    pub fn state(&self) -> MutationState {
        self.state.get()
    }

    /// Subscribe to flag transitions.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<MutationState> {
        self.state.subscribe()
    }

    /// Number of invocations started so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Run the operation with `variables`.
    ///
    /// Callbacks fire before this returns.
    ///
    /// # Errors
    ///
    /// Returns the normalised [`MutationError`] when the operation fails.
    pub async fn run<F, Fut, E>(&self, operation: F, variables: V) -> Result<T, MutationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        self.run_traced(operation, variables).await.0
    }

    /// Like [`MutationRunner::run`], also returning this invocation's own
    /// flag transitions.
    pub async fn run_traced<F, Fut, E>(
        &self,
        operation: F,
        variables: V,
    ) -> (Result<T, MutationError>, MutationTrace)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let invocation = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        let span = tracing::debug_span!("mutation", name = %self.name, invocation);

        async move {
            let mut trace = MutationTrace::new(invocation);

            self.begin(invocation);
            trace.record(MutationState::PENDING);
            metrics::counter!("mutation.started", "mutation" => self.name.to_string()).increment(1);
            tracing::debug!("Mutation started");

            let result = match tokio::spawn(operation()).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(MutationError::from_error(&error)),
                Err(join_error) => {
                    tracing::warn!(error = %join_error, "Mutation operation did not complete");
                    Err(MutationError::Unknown)
                },
            };

            match &result {
                Ok(value) => {
                    self.settle(invocation, MutationState::SUCCEEDED);
                    trace.record(MutationState::SUCCEEDED);
                    metrics::counter!("mutation.succeeded", "mutation" => self.name.to_string())
                        .increment(1);
                    tracing::debug!("Mutation succeeded");
                    if let Some(on_success) = &self.callbacks.on_success {
                        on_success(value, &variables);
                    }
                },
                Err(error) => {
                    self.settle(invocation, MutationState::FAILED);
                    trace.record(MutationState::FAILED);
                    metrics::counter!("mutation.failed", "mutation" => self.name.to_string())
                        .increment(1);
                    tracing::info!(error = %error, "Mutation failed");
                    if let Some(on_error) = &self.callbacks.on_error {
                        on_error(error, &variables);
                    }
                },
            }

            (result, trace)
        }
        .instrument(span)
        .await
    }

    /// Mark an invocation as started.
    fn begin(&self, invocation: u64) {
        let latest = &self.latest;
        self.state.update(|state| {
            latest.store(invocation, Ordering::SeqCst);
            *state = MutationState::PENDING;
        });
    }

    /// Publish an invocation's settled flags, subject to the overlap policy.
    fn settle(&self, invocation: u64, settled: MutationState) {
        match self.policy {
            OverlapPolicy::Shared => self.state.set(settled),
            OverlapPolicy::Isolated => {
                let latest = &self.latest;
                let applied = self.state.update_if(|state| {
                    if latest.load(Ordering::SeqCst) == invocation {
                        *state = settled;
                        true
                    } else {
                        false
                    }
                });
                if !applied {
                    tracing::trace!(invocation, "Superseded invocation settled; shared flags untouched");
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[derive(Debug)]
    struct Failure(&'static str);

    impl std::fmt::Display for Failure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    #[tokio::test]
    async fn success_clears_pending_and_calls_on_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let runner = MutationRunner::with_callbacks(
            "claim",
            OverlapPolicy::Isolated,
            MutationCallbacks::<u32, String>::new().on_success(move |value, vars| {
                seen_clone.lock().unwrap().push(format!("{vars}={value}"));
            }),
        );

        let result = runner
            .run(|| async { Ok::<_, Failure>(7) }, "alice".to_string())
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(runner.state(), MutationState::SUCCEEDED);
        assert_eq!(*seen.lock().unwrap(), vec!["alice=7".to_string()]);
    }

    #[tokio::test]
    async fn failure_sets_error_and_calls_on_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let runner = MutationRunner::with_callbacks(
            "claim",
            OverlapPolicy::Isolated,
            MutationCallbacks::<u32, String>::new().on_error(move |error, vars| {
                seen_clone.lock().unwrap().push(format!("{vars}: {error}"));
            }),
        );

        let result = runner
            .run(|| async { Err::<u32, _>(Failure("Operation failed")) }, "bob".to_string())
            .await;

        assert_eq!(result, Err(MutationError::Operation("Operation failed".into())));
        assert_eq!(runner.state(), MutationState::FAILED);
        assert_eq!(*seen.lock().unwrap(), vec!["bob: Operation failed".to_string()]);
    }

    #[tokio::test]
    async fn panicking_operation_is_unknown_error() {
        #[allow(clippy::panic)]
        async fn explode() -> Result<u32, Failure> {
            panic!("not an error value")
        }

        let runner: MutationRunner<u32, ()> = MutationRunner::new("claim");
        let result = runner.run(explode, ()).await;

        let error = result.unwrap_err();
        assert_eq!(error, MutationError::Unknown);
        assert_eq!(error.to_string(), "Unknown error");
        assert!(runner.state().is_error);
    }

    #[tokio::test]
    async fn pending_only_between_start_and_settlement() {
        let runner: MutationRunner<(), ()> = MutationRunner::new("claim");
        let mut rx = runner.subscribe();
        let (release, gate) = oneshot::channel::<()>();

        assert!(!runner.state().is_pending);

        let task = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(
                        || async move {
                            let _ = gate.await;
                            Ok::<_, Failure>(())
                        },
                        (),
                    )
                    .await
            })
        };

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), MutationState::PENDING);

        release.send(()).unwrap();
        let _ = task.await.unwrap();

        assert_eq!(*rx.borrow_and_update(), MutationState::SUCCEEDED);
        assert!(!runner.state().is_pending);
    }

    #[tokio::test]
    async fn restart_resets_error_flag() {
        let runner: MutationRunner<(), ()> = MutationRunner::new("claim");

        let _ = runner.run(|| async { Err::<(), _>(Failure("boom")) }, ()).await;
        assert!(runner.state().is_error);

        let (_trace_result, trace) = runner
            .run_traced(|| async { Ok::<(), Failure>(()) }, ())
            .await;
        assert_eq!(trace.transitions[0], MutationState::PENDING);
        assert!(!runner.state().is_error);
    }

    #[tokio::test]
    async fn same_arguments_give_independent_traces() {
        let runner: MutationRunner<u8, &str> = MutationRunner::new("claim");

        let (_, first) = runner.run_traced(|| async { Ok::<_, Failure>(1) }, "alice").await;
        let (_, second) = runner.run_traced(|| async { Ok::<_, Failure>(1) }, "alice").await;

        assert_eq!(first.invocation, 1);
        assert_eq!(second.invocation, 2);
        assert_eq!(first.transitions, vec![MutationState::PENDING, MutationState::SUCCEEDED]);
        assert_eq!(first.transitions, second.transitions);
        assert_eq!(runner.invocations(), 2);
    }

    /// Start a slow invocation A, then a fast invocation B; let B settle while
    /// A is still running, then A fails. Returns the shared flags observed
    /// after B settled and after A settled.
    async fn overlap(policy: OverlapPolicy) -> (MutationState, MutationState) {
        let runner: MutationRunner<(), &'static str> =
            MutationRunner::with_callbacks("claim", policy, MutationCallbacks::new());
        let (release_a, gate_a) = oneshot::channel::<()>();

        let slow = {
            let runner = runner.clone();
            tokio::spawn(async move {
                runner
                    .run(
                        || async move {
                            let _ = gate_a.await;
                            Err::<(), _>(Failure("slow failed"))
                        },
                        "a",
                    )
                    .await
            })
        };

        // Let A start before B
        while runner.invocations() < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let _ = runner.run(|| async { Ok::<(), Failure>(()) }, "b").await;
        let after_b = runner.state();

        release_a.send(()).unwrap();
        let _ = slow.await.unwrap();
        let after_a = runner.state();

        (after_b, after_a)
    }

    #[tokio::test]
    async fn shared_policy_lets_last_transition_win() {
        let (after_b, after_a) = overlap(OverlapPolicy::Shared).await;

        assert_eq!(after_b, MutationState::SUCCEEDED);
        // The older invocation overwrites the newer one's outcome
        assert_eq!(after_a, MutationState::FAILED);
    }

    #[tokio::test]
    async fn isolated_policy_ignores_superseded_invocations() {
        let (after_b, after_a) = overlap(OverlapPolicy::Isolated).await;

        assert_eq!(after_b, MutationState::SUCCEEDED);
        assert_eq!(after_a, MutationState::SUCCEEDED);
    }

    proptest::proptest! {
        #[test]
        fn sequential_runs_report_the_last_outcome(outcomes in proptest::collection::vec(proptest::bool::ANY, 1..12)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let runner: MutationRunner<(), ()> = MutationRunner::new("claim");

            for ok in &outcomes {
                let ok = *ok;
                let result = rt.block_on(runner.run(
                    move || async move { if ok { Ok(()) } else { Err(Failure("no")) } },
                    (),
                ));
                proptest::prop_assert_eq!(result.is_ok(), ok);
                proptest::prop_assert!(!runner.state().is_pending);
            }

            let last = *outcomes.last().unwrap();
            proptest::prop_assert_eq!(runner.state().is_error, !last);
            proptest::prop_assert_eq!(runner.invocations(), outcomes.len() as u64);
        }
    }
}
