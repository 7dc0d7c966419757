//! End-to-end tests for the claim form facade
//!
//! These drive the real store, reducer, mutation runner, and notification
//! path with scripted collaborators, on paused time and on a multi-threaded
//! runtime.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use claim_form::{
    ClaimForm, FormError, SimulatedEmailClient, SubmissionEnvironment, SubmissionMode, SubmitOutcome,
};
use composable_forms_core::mutation::{MutationState, OverlapPolicy};
use composable_forms_core::request::{Status, SubmissionRequest};
use composable_forms_core::submission::{FailIdentifiers, NoFaults};
use composable_forms_testing::helpers::init_tracing;
use composable_forms_testing::{RecordingNotifier, Scripted, ScriptedSubmissionClient, test_clock};
use std::sync::Arc;
use std::time::Duration;

const LATENCY: Duration = Duration::from_secs(1);

fn form_with(
    mode: SubmissionMode,
    client: ScriptedSubmissionClient,
    notifier: &RecordingNotifier,
) -> ClaimForm {
    init_tracing();
    let env = SubmissionEnvironment::new(
        Arc::new(client),
        Arc::new(notifier.clone()),
        Arc::new(test_clock()),
    );
    ClaimForm::new(mode, env)
}

fn statuses(list: &[SubmissionRequest]) -> Vec<Status> {
    list.iter().map(|r| r.status).collect()
}

// ============================================================================
// Submission scenarios
// ============================================================================

#[tokio::test]
async fn short_identifier_is_refused_without_calling_the_client() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    let outcome = form.submit("ab").await.unwrap();

    let SubmitOutcome::Invalid { error } = outcome else {
        panic!("expected Invalid, got {outcome:?}");
    };
    assert_eq!(
        error.messages_for("identifier").collect::<Vec<_>>(),
        vec!["must be at least 3 characters"]
    );
    assert_eq!(client.call_count(), 0);
    assert!(form.display_list().await.is_empty());
    assert!(notifier.notifications().is_empty());
    assert_eq!(form.mutation_state(), MutationState::IDLE);
}

#[tokio::test]
async fn accepted_claim_is_requested_and_announced() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    let outcome = form.submit("alice").await.unwrap();

    assert_eq!(outcome.status(), Some(Status::Requested));
    assert_eq!(client.call_count(), 1);
    assert_eq!(client.calls()[0].identifier.as_str(), "alice");

    let list = form.display_list().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].identifier, "alice");
    assert_eq!(list[0].status, Status::Requested);

    let successes = notifier.successes();
    assert_eq!(successes.len(), 1);
    assert!(successes[0].contains("alice"));
    assert!(notifier.errors().is_empty());
}

#[tokio::test]
async fn rejected_claim_records_error_and_reports_message() {
    let client = ScriptedSubmissionClient::rejecting("Operation failed");
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    let outcome = form.submit("bob").await.unwrap();

    let SubmitOutcome::Failed { entry, message } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert_eq!(entry.identifier, "bob");
    assert_eq!(entry.status, Status::Error);
    assert_eq!(message, "Operation failed");
    assert_eq!(notifier.errors(), vec!["Operation failed".to_string()]);
    assert!(notifier.successes().is_empty());
    assert_eq!(form.mutation_state(), MutationState::FAILED);
}

#[tokio::test]
async fn panicking_client_settles_as_unknown_error() {
    let client = ScriptedSubmissionClient::new().then_panic();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    let outcome = form.submit("carol").await.unwrap();

    let SubmitOutcome::Failed { message, .. } = outcome else {
        panic!("expected Failed, got {outcome:?}");
    };
    assert_eq!(message, "Unknown error");
    assert_eq!(notifier.errors(), vec!["Unknown error".to_string()]);
}

#[tokio::test]
async fn identifier_is_trimmed_before_submission() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    form.submit("  dave  ").await.unwrap();

    assert_eq!(client.calls()[0].identifier.as_str(), "dave");
    assert_eq!(form.display_list().await[0].identifier, "dave");
}

// ============================================================================
// Optimistic display
// ============================================================================

#[tokio::test(start_paused = true)]
async fn pending_entries_show_while_in_flight() {
    let client = ScriptedSubmissionClient::new().with_latency(LATENCY);
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    form.submit("alice").await.unwrap();
    let before = form.display_list().await.len();

    form.start("erin").await.unwrap();

    let pending = form.display_list().await;
    assert_eq!(pending.len(), before + 1);
    assert_eq!(pending.last().unwrap().identifier, "erin");
    assert_eq!(pending.last().unwrap().status, Status::Pending);
    // The log itself only receives terminal entries in optimistic mode
    assert_eq!(form.log().await.len(), before);

    form.settle_all(LATENCY * 2).await.unwrap();

    let settled = form.display_list().await;
    assert_eq!(settled.len(), before + 1);
    assert_eq!(settled.last().unwrap().status, Status::Requested);
    assert!(settled.iter().all(|r| r.status != Status::Pending));
}

#[tokio::test(start_paused = true)]
async fn overlapping_submissions_each_get_one_entry() {
    let client = ScriptedSubmissionClient::new()
        .with_latency(LATENCY)
        .then_accept()
        .then_reject("Operation failed")
        .then_accept();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    for identifier in ["alice", "bob", "carol"] {
        form.start(identifier).await.unwrap();
    }
    assert_eq!(
        statuses(&form.display_list().await),
        vec![Status::Pending; 3]
    );

    form.settle_all(LATENCY * 2).await.unwrap();

    let list = form.display_list().await;
    assert_eq!(list.len(), 3);
    assert_eq!(list.iter().filter(|r| r.status == Status::Requested).count(), 2);
    assert_eq!(list.iter().filter(|r| r.status == Status::Error).count(), 1);
    assert_eq!(notifier.successes().len() + notifier.errors().len(), 3);
}

#[tokio::test]
async fn direct_mode_logs_pending_then_terminal() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Direct, client, &notifier);

    form.submit("alice").await.unwrap();
    form.submit("bob").await.unwrap();

    let log = form.log().await;
    assert_eq!(log.len(), 4);
    assert_eq!(
        statuses(&log),
        vec![Status::Pending, Status::Requested, Status::Pending, Status::Requested]
    );
    assert_eq!(log[0].submission_id, log[1].submission_id);
    // Direct mode renders the log as-is
    assert_eq!(form.display_list().await, log);
}

// ============================================================================
// Mutation flags
// ============================================================================

#[tokio::test(start_paused = true)]
async fn pending_flag_spans_the_submission() {
    let client = ScriptedSubmissionClient::new().with_latency(LATENCY);
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);
    let mut flags = form.watch_mutation();

    assert!(!form.mutation_state().is_pending);
    form.start("alice").await.unwrap();

    flags.wait_for(|s| s.is_pending).await.unwrap();
    assert!(notifier.successes().is_empty());

    form.settle_all(LATENCY * 2).await.unwrap();

    assert_eq!(form.mutation_state(), MutationState::SUCCEEDED);
    assert_eq!(notifier.successes().len(), 1);
}

async fn overlap_run(policy: OverlapPolicy) -> (MutationState, RecordingNotifier) {
    // The first submission is slower and fails after the second succeeded
    let client = ScriptedSubmissionClient::new()
        .then(LATENCY * 2, Scripted::Reject("Operation failed".into()))
        .then(LATENCY, Scripted::Accept);
    let notifier = RecordingNotifier::new();
    let env = SubmissionEnvironment::new(
        Arc::new(client),
        Arc::new(notifier.clone()),
        Arc::new(test_clock()),
    )
    .with_overlap_policy(policy);
    let form = ClaimForm::new(SubmissionMode::Optimistic, env);

    form.start("alice").await.unwrap();
    form.start("bob").await.unwrap();
    form.settle_all(LATENCY * 4).await.unwrap();

    (form.mutation_state(), notifier)
}

#[tokio::test(start_paused = true)]
async fn isolated_policy_keeps_latest_invocation_flags() {
    let (flags, notifier) = overlap_run(OverlapPolicy::Isolated).await;

    assert_eq!(flags, MutationState::SUCCEEDED);
    assert_eq!(notifier.errors(), vec!["Operation failed".to_string()]);
    assert_eq!(notifier.successes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shared_policy_keeps_last_settled_flags() {
    let (flags, _) = overlap_run(OverlapPolicy::Shared).await;

    assert_eq!(flags, MutationState::FAILED);
}

// ============================================================================
// Retry and review
// ============================================================================

#[tokio::test]
async fn failed_claim_can_be_retried() {
    let client = ScriptedSubmissionClient::new().then_reject("Operation failed");
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    assert_eq!(form.submit("bob").await.unwrap().status(), Some(Status::Error));
    let outcome = form.retry("bob").await.unwrap();

    assert_eq!(outcome.status(), Some(Status::Requested));
    assert_eq!(client.call_count(), 2);
    assert_eq!(statuses(&form.log().await), vec![Status::Error, Status::Requested]);
}

#[tokio::test]
async fn retry_of_unfailed_claim_is_ignored() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    form.submit("alice").await.unwrap();

    assert_eq!(form.retry("alice").await.unwrap(), SubmitOutcome::Ignored);
    assert_eq!(form.retry("nobody").await.unwrap(), SubmitOutcome::Ignored);
    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn requested_claim_can_be_reviewed() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    form.submit("alice").await.unwrap();
    form.submit("bob").await.unwrap();
    form.review("alice", true).await.unwrap();
    form.review("bob", false).await.unwrap();

    let log = form.log().await;
    assert_eq!(
        statuses(&log),
        vec![Status::Requested, Status::Requested, Status::Approved, Status::Rejected]
    );
    assert!(notifier.successes().contains(&"Claim for alice approved".to_string()));
    assert!(notifier.successes().contains(&"Claim for bob rejected".to_string()));
}

#[tokio::test]
async fn review_without_request_changes_nothing() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client, &notifier);

    form.review("ghost", true).await.unwrap();

    assert!(form.log().await.is_empty());
    assert!(notifier.notifications().is_empty());
}

// ============================================================================
// Simulated email client
// ============================================================================

#[tokio::test(start_paused = true)]
async fn simulated_email_honours_injected_faults() {
    init_tracing();
    let notifier = RecordingNotifier::new();
    let client = SimulatedEmailClient::new(LATENCY, Arc::new(FailIdentifiers::new(["bob"])));
    let env = SubmissionEnvironment::new(
        Arc::new(client),
        Arc::new(notifier.clone()),
        Arc::new(test_clock()),
    );
    let form = ClaimForm::new(SubmissionMode::Optimistic, env);

    assert_eq!(form.submit("alice").await.unwrap().status(), Some(Status::Requested));
    assert_eq!(form.submit("bob").await.unwrap().status(), Some(Status::Error));
    assert_eq!(notifier.errors(), vec!["Operation failed".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_running_submissions() {
    let client = SimulatedEmailClient::new(LATENCY, Arc::new(NoFaults));
    let notifier = RecordingNotifier::new();
    let env = SubmissionEnvironment::new(
        Arc::new(client),
        Arc::new(notifier.clone()),
        Arc::new(test_clock()),
    );
    let form = ClaimForm::new(SubmissionMode::Optimistic, env);

    form.start("alice").await.unwrap();
    form.shutdown(LATENCY * 2).await.unwrap();

    assert!(form.start("bob").await.is_err());
    assert_eq!(notifier.successes().len(), 1);
    assert_eq!(statuses(&form.log().await), vec![Status::Requested]);
    assert_eq!(statuses(&form.display_list().await), vec![Status::Requested]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_flight_logs_terminal_entries() {
    let client = ScriptedSubmissionClient::new()
        .with_latency(Duration::from_millis(50))
        .then_accept()
        .then_reject("Operation failed");
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Direct, client, &notifier);

    form.start("alice").await.unwrap();
    form.start("bob").await.unwrap();
    form.shutdown(LATENCY).await.unwrap();

    let log = form.log().await;
    assert_eq!(log.len(), 4);
    assert_eq!(log.iter().filter(|r| r.status == Status::Pending).count(), 2);
    assert_eq!(log.iter().filter(|r| r.status.is_terminal()).count(), 2);
    assert!(!form.store().state(claim_form::SubmissionState::is_submitting).await);
    assert!(matches!(form.submit("carol").await, Err(FormError::Store(_))));
}

// ============================================================================
// Multi-threaded runtime
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fast_submissions_are_never_reported_as_ignored() {
    for _ in 0..200 {
        let notifier = RecordingNotifier::new();
        let form = form_with(SubmissionMode::Optimistic, ScriptedSubmissionClient::new(), &notifier);

        let outcome = form.submit("alice").await.unwrap();

        assert_eq!(outcome.status(), Some(Status::Requested), "got {outcome:?}");
        assert_eq!(notifier.successes().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fast_failures_and_retries_settle_on_every_worker() {
    for _ in 0..100 {
        let client = ScriptedSubmissionClient::new().then_reject("Operation failed");
        let notifier = RecordingNotifier::new();
        let form = form_with(SubmissionMode::Direct, client, &notifier);

        assert_eq!(form.submit("bob").await.unwrap().status(), Some(Status::Error));
        assert_eq!(form.retry("bob").await.unwrap().status(), Some(Status::Requested));
        assert_eq!(
            statuses(&form.log().await),
            vec![Status::Pending, Status::Error, Status::Pending, Status::Requested]
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_each_get_their_own_outcome() {
    let client = ScriptedSubmissionClient::new();
    let notifier = RecordingNotifier::new();
    let form = form_with(SubmissionMode::Optimistic, client.clone(), &notifier);

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let form = form.clone();
            tokio::spawn(async move { form.submit(format!("user{n:02}")).await })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status(), Some(Status::Requested), "got {outcome:?}");
    }
    assert_eq!(client.call_count(), 16);
    assert_eq!(form.display_list().await.len(), 16);
}
