//! Job store state machine and durability tests.

mod common;

use common::{ScriptedClient, SubmissionBuilder, TestHarness, ROUND_TRIP_REPLY};
use deckscore::analysis::parse_analysis;
use deckscore::{Database, JobStatus, JobStore, JobStoreError, Transition};

fn store() -> JobStore {
    JobStore::new(Database::open_in_memory().unwrap())
}

fn sample_result() -> deckscore::AnalysisResult {
    parse_analysis(ROUND_TRIP_REPLY).unwrap()
}

fn assert_invalid(result: Result<deckscore::Job, JobStoreError>, from: JobStatus, to: JobStatus) {
    match result {
        Err(JobStoreError::InvalidTransition {
            from: actual_from,
            to: actual_to,
            ..
        }) => {
            assert_eq!(actual_from, from);
            assert_eq!(actual_to, to);
        }
        other => panic!("Expected InvalidTransition {} -> {}, got {:?}", from, to, other),
    }
}

#[test]
fn test_new_job_is_pending_without_outcome() {
    let store = store();
    let job = store.create(None).unwrap();

    let stored = store.get(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Pending);
    assert!(stored.result.is_none());
    assert!(stored.error_message.is_none());
    assert!(stored.completed_at.is_none());
}

#[test]
fn test_completion_stores_result_only() {
    let store = store();
    let job = store.create(None).unwrap();
    store.transition(&job.id, Transition::Start).unwrap();
    store
        .transition(&job.id, Transition::Complete(sample_result()))
        .unwrap();

    let stored = store.get(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert!(stored.error_message.is_none());
    assert!(stored.completed_at.is_some());
    let result = stored.result.unwrap();
    assert_eq!(result.overall_score, 72.0);
    assert_eq!(result.pitch_analysis["clarity"], 8);
}

#[test]
fn test_failure_stores_error_only() {
    let store = store();
    let job = store.create(None).unwrap();
    store.transition(&job.id, Transition::Start).unwrap();
    store
        .transition(&job.id, Transition::Fail("UpstreamUnavailable: timed out".to_string()))
        .unwrap();

    let stored = store.get(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.result.is_none());
    assert_eq!(
        stored.error_message.as_deref(),
        Some("UpstreamUnavailable: timed out")
    );
}

#[test]
fn test_processing_cannot_go_back_to_pending() {
    assert!(!JobStatus::Processing.can_transition_to(JobStatus::Pending));

    let store = store();
    let job = store.create(None).unwrap();
    store.transition(&job.id, Transition::Start).unwrap();

    assert_invalid(
        store.transition(&job.id, Transition::Start),
        JobStatus::Processing,
        JobStatus::Processing,
    );
    assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Processing);
}

#[test]
fn test_pending_job_cannot_finish_without_starting() {
    let store = store();
    let job = store.create(None).unwrap();

    assert_invalid(
        store.transition(&job.id, Transition::Complete(sample_result())),
        JobStatus::Pending,
        JobStatus::Completed,
    );
    assert_invalid(
        store.transition(&job.id, Transition::Fail("InternalError: boom".to_string())),
        JobStatus::Pending,
        JobStatus::Failed,
    );
    assert_eq!(store.get(&job.id).unwrap().status, JobStatus::Pending);
}

#[test]
fn test_terminal_jobs_reject_every_write() {
    let store = store();

    let completed = store.create(None).unwrap();
    store.transition(&completed.id, Transition::Start).unwrap();
    store
        .transition(&completed.id, Transition::Complete(sample_result()))
        .unwrap();

    let failed = store.create(None).unwrap();
    store.transition(&failed.id, Transition::Start).unwrap();
    store
        .transition(&failed.id, Transition::Fail("NoValidInput: nothing".to_string()))
        .unwrap();

    for (job_id, status) in [
        (&completed.id, JobStatus::Completed),
        (&failed.id, JobStatus::Failed),
    ] {
        assert_invalid(
            store.transition(job_id, Transition::Start),
            status,
            JobStatus::Processing,
        );
        assert_invalid(
            store.transition(job_id, Transition::Complete(sample_result())),
            status,
            JobStatus::Completed,
        );
        assert_invalid(
            store.transition(job_id, Transition::Fail("late".to_string())),
            status,
            JobStatus::Failed,
        );
    }

    // The original outcomes are untouched.
    let completed = store.get(&completed.id).unwrap();
    assert!(completed.result.is_some() && completed.error_message.is_none());
    let failed = store.get(&failed.id).unwrap();
    assert!(failed.result.is_none());
    assert_eq!(failed.error_message.as_deref(), Some("NoValidInput: nothing"));
}

#[test]
fn test_unknown_job_is_not_found() {
    let store = store();
    assert!(matches!(store.get("missing"), Err(JobStoreError::NotFound(_))));
    assert!(matches!(
        store.transition("missing", Transition::Start),
        Err(JobStoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_outcomes_survive_reopening_the_database() {
    let client = ScriptedClient::replying(ROUND_TRIP_REPLY).then(Ok("{\"pitch_analysis\": {}}"));
    let harness = TestHarness::with_file_database(client);

    let failed = harness
        .service
        .submit(SubmissionBuilder::new().pdf("first.pdf", "Acme").build())
        .unwrap();
    harness.wait_for_jobs().await;
    let completed = harness
        .service
        .submit(SubmissionBuilder::new().pdf("second.pdf", "Acme").build())
        .unwrap();
    harness.wait_for_jobs().await;

    let reopened = JobStore::new(harness.reopen_database());

    let failed = reopened.get(&failed.job_id).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.result.is_none());
    assert!(failed
        .error_message
        .unwrap()
        .starts_with("IncompleteResponse:"));

    let completed = reopened.get(&completed.job_id).unwrap();
    assert_eq!(completed.status, JobStatus::Completed);
    assert!(completed.error_message.is_none());
    let result = completed.result.unwrap();
    assert_eq!(result.overall_score, 72.0);
    assert_eq!(result.pitch_analysis["clarity"], 8);
    assert!(result.market_research.is_empty());
}
