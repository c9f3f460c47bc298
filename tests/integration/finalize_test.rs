//! Finalizer Integration Tests
//!
//! Submission failures, explicit retries, missing sessions and the
//! suggestions a successful submission hands back.

use wizard_flow::engine::SequencerState;
use wizard_flow::services::wizard::{FinalizeOutcome, NoticeLevel, SnapshotStore, SubmitOutcome};
use wizard_flow::{AppError, WizardController};

use super::support::*;

async fn answer_to_the_end(
    harness: &Harness,
    session_id: Option<&str>,
) -> (WizardController, SubmitOutcome) {
    let controller = harness.controller(proof_model(), session_id);
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    controller.submit_current("no").await;
    let outcome = controller.submit_current("skip").await;
    (controller, outcome)
}

#[tokio::test]
async fn test_failed_submission_keeps_answers_and_retries() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    harness.submitter.fail_next(1);

    let (controller, outcome) = answer_to_the_end(&harness, Some(&session.id)).await;
    match outcome {
        SubmitOutcome::FinalizeFailed(AppError::Submission(msg)) => assert!(msg.contains("503")),
        other => panic!("unexpected outcome {:?}", other),
    }

    let view = controller.view().await;
    assert_eq!(view.state, SequencerState::Finalizing);
    assert!(!view.is_finalizing);
    assert!(!view.is_completed);
    assert!(view.error.unwrap().contains("503"));
    assert_eq!(view.transcript.len(), 6);
    assert!(harness.notifier.levels().contains(&NoticeLevel::Error));
    assert!(!harness.stored_session(&session.id).await.is_step_completed("proof_elements"));

    let snapshot = harness
        .manager
        .load_snapshot(WORKSPACE, "proof_elements")
        .await
        .unwrap()
        .unwrap();
    assert!(!snapshot.is_finalizing);

    assert!(controller.finalize().await.is_submitted());
    assert_eq!(harness.submitter.calls(), 2);
    let view = controller.view().await;
    assert!(view.is_completed);
    assert!(view.error.is_none());
    assert!(harness.stored_session(&session.id).await.is_step_completed("proof_elements"));
}

#[tokio::test]
async fn test_missing_session_blocks_submission() {
    let harness = Harness::new();
    let (controller, outcome) = answer_to_the_end(&harness, None).await;

    assert!(matches!(outcome, SubmitOutcome::FinalizeFailed(AppError::SessionMissing(_))));
    assert_eq!(harness.submitter.calls(), 0);
    assert_eq!(harness.notifier.levels(), vec![NoticeLevel::Blocking]);

    let view = controller.view().await;
    assert_eq!(view.state, SequencerState::Finalizing);
    assert!(view.error.is_some());
}

#[tokio::test]
async fn test_unknown_session_id_blocks_submission() {
    let harness = Harness::new();
    let (_, outcome) = answer_to_the_end(&harness, Some("no-such-session")).await;
    assert!(matches!(outcome, SubmitOutcome::FinalizeFailed(AppError::SessionMissing(_))));
    assert_eq!(harness.submitter.calls(), 0);
}

#[tokio::test]
async fn test_finalize_before_the_end_is_not_ready() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    controller.submit_current(CORE_PROMISE).await;

    assert!(matches!(controller.finalize().await, FinalizeOutcome::NotReady));
    assert_eq!(harness.submitter.calls(), 0);
}

#[tokio::test]
async fn test_skipped_questions_come_back_as_suggestions() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let (_, outcome) = answer_to_the_end(&harness, Some(&session.id)).await;
    assert!(matches!(outcome, SubmitOutcome::Completed));

    let stored = harness.stored_session(&session.id).await;
    let step = stored.step("proof_elements").unwrap();
    assert_eq!(step.suggestions.len(), 1);
    assert!(step.result.is_some());
    assert_eq!(step.data.items.len(), 1);

    let messages = harness.notifier.messages();
    assert!(messages.last().unwrap().contains("skipped"));
}
