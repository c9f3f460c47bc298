//! Resume Integration Tests
//!
//! Reloading a step from the session record, the form-data cache and the
//! persisted UI snapshot, including the automatic resume of a submission
//! that was interrupted by a reload.

use std::collections::BTreeMap;
use std::time::Duration;

use wizard_flow::engine::{PersistedUiState, SequencerState, StepData};
use wizard_flow::services::wizard::{FinalizeOutcome, FormDataStore, SessionStore, SnapshotStore};
use wizard_flow::{EngineConfig, Identity};

use super::support::*;

fn asking(key_str: &str) -> SequencerState {
    SequencerState::Asking {
        key: key(key_str),
        prefill: String::new(),
    }
}

/// Form data and snapshot of a proof step answered to the end while the
/// submission was still running.
async fn seed_interrupted_submission(harness: &Harness) {
    let mut data = StepData::with_items(1);
    data.set_value("corePromise", CORE_PROMISE);
    data.set_item_value(0, "type", "testimonial");
    data.set_item_value(0, "description", "Rated five stars by Jane");
    harness
        .manager
        .save_form_data(WORKSPACE, "proof_elements", &data)
        .await
        .unwrap();

    let snapshot = PersistedUiState {
        current_question_key: None,
        current_input_value: String::new(),
        answered_questions: [
            "corePromise",
            "proof[0].type",
            "proof[0].description",
            "proof[0].url",
            "ask-more-proof[1]",
            "notes",
        ]
        .into_iter()
        .map(key)
        .collect(),
        answers: BTreeMap::from([(key("ask-more-proof[1]"), "no".to_string())]),
        is_finalizing: true,
    };
    harness
        .manager
        .save_snapshot(WORKSPACE, "proof_elements", &snapshot)
        .await
        .unwrap();
}

// ============================================================================
// Position after reload
// ============================================================================

#[tokio::test]
async fn test_reload_lands_on_same_question_with_draft() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    controller.submit_current(CORE_PROMISE).await;
    controller.submit_current("Case study").await;
    controller.set_draft("Cut onboarding").await;
    controller.flush().await.unwrap();
    let before = controller.view().await;

    let reloaded = harness.controller(proof_model(), Some(&session.id));
    let report = reloaded.mount().await.unwrap();
    assert!(!report.pointer_discarded);
    assert!(report.resumed_finalize.is_none());

    let after = reloaded.view().await;
    assert_eq!(after.state, asking("proof[0].description"));
    assert_eq!(after.draft, "Cut onboarding");
    assert_eq!(after.transcript, before.transcript);
}

#[tokio::test]
async fn test_abandoned_item_resumes_where_it_stopped() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    controller.submit_current("yes").await;
    controller.submit_current("award").await;
    controller.flush().await.unwrap();

    let reloaded = harness.controller(proof_model(), Some(&session.id));
    reloaded.mount().await.unwrap();

    let view = reloaded.view().await;
    assert_eq!(view.state, asking("proof[1].description"));
    // The optional url skipped on the first item stays answered
    assert!(view.transcript.iter().any(|line| line.key == key("proof[0].url")));
}

#[tokio::test]
async fn test_stale_pointer_is_discarded() {
    let harness = Harness::new();
    let snapshot = PersistedUiState {
        current_question_key: Some(key("proof[3].type")),
        current_input_value: "leftover".to_string(),
        ..Default::default()
    };
    harness
        .manager
        .save_snapshot(WORKSPACE, "proof_elements", &snapshot)
        .await
        .unwrap();

    let controller = harness.controller(proof_model(), None);
    let report = controller.mount().await.unwrap();
    assert!(report.pointer_discarded);
    assert_eq!(report.state, asking("corePromise"));
    assert_eq!(controller.view().await.draft, "");
}

#[tokio::test]
async fn test_session_record_wins_over_cache() {
    let harness = Harness::new();
    let mut session = harness.new_session().await;
    let mut record = StepData::with_items(1);
    record.set_value("corePromise", "Recorded promise that the backend kept");
    session.set_step_data("proof_elements", record);
    harness.manager.save_session(&session).await.unwrap();

    let mut cache = StepData::with_items(1);
    cache.set_value("corePromise", "A stale promise from the local cache");
    cache.set_item_value(0, "type", "award");
    harness
        .manager
        .save_form_data(WORKSPACE, "proof_elements", &cache)
        .await
        .unwrap();

    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();

    let cached = controller.session().await.unwrap();
    assert_eq!(
        cached.step("proof_elements").unwrap().data.value("corePromise"),
        "Recorded promise that the backend kept"
    );
    // The cache still fills gaps the record leaves
    assert_eq!(controller.view().await.state, asking("proof[0].description"));
}

#[tokio::test]
async fn test_completed_step_stays_done() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    controller.submit_current("no").await;
    controller.submit_current("skip").await;
    assert_eq!(harness.submitter.calls(), 1);

    let reloaded = harness.controller(proof_model(), Some(&session.id));
    let report = reloaded.mount().await.unwrap();
    assert_eq!(report.state, SequencerState::Done);
    assert!(report.resumed_finalize.is_none());
    assert!(reloaded.view().await.is_completed);
    assert_eq!(harness.submitter.calls(), 1);
}

// ============================================================================
// Interrupted submission
// ============================================================================

#[tokio::test]
async fn test_interrupted_submission_resumes_once() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    seed_interrupted_submission(&harness).await;

    let controller = harness.controller(proof_model(), Some(&session.id));
    let report = controller.mount().await.unwrap();
    assert!(matches!(report.resumed_finalize, Some(FinalizeOutcome::Submitted)));
    assert_eq!(harness.submitter.calls(), 1);

    controller.refresh().await;
    let again = controller.mount().await.unwrap();
    assert!(again.resumed_finalize.is_none());
    assert_eq!(harness.submitter.calls(), 1);

    let stored = harness.stored_session(&session.id).await;
    assert!(stored.is_step_completed("proof_elements"));
}

#[tokio::test]
async fn test_reload_during_settle_delay_still_submits() {
    let harness = Harness::with_config(EngineConfig {
        settle_delay_ms: 50,
        ..EngineConfig::immediate()
    });
    let session = harness.new_session().await;
    let first = harness.controller(proof_model(), Some(&session.id));
    first.mount().await.unwrap();
    answer_first_proof(&first).await;
    first.submit_current("no").await;

    // The page goes away while the last answer is still settling
    let cancelled =
        tokio::time::timeout(Duration::from_millis(5), first.submit_current("skip")).await;
    assert!(cancelled.is_err());
    first.flush().await.unwrap();
    assert_eq!(harness.submitter.calls(), 0);

    let snapshot = harness
        .manager
        .load_snapshot(WORKSPACE, "proof_elements")
        .await
        .unwrap()
        .unwrap();
    assert!(snapshot.is_finalizing);

    let second = harness.controller(proof_model(), Some(&session.id));
    let report = second.mount().await.unwrap();
    assert!(matches!(report.resumed_finalize, Some(FinalizeOutcome::Submitted)));
    assert_eq!(harness.submitter.calls(), 1);
    assert!(harness
        .stored_session(&session.id)
        .await
        .is_step_completed("proof_elements"));
}

#[tokio::test]
async fn test_failed_resume_is_not_retried_automatically() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    seed_interrupted_submission(&harness).await;
    harness.submitter.fail_next(1);

    let controller = harness.controller(proof_model(), Some(&session.id));
    let report = controller.mount().await.unwrap();
    assert!(matches!(report.resumed_finalize, Some(FinalizeOutcome::Failed(_))));
    assert_eq!(harness.submitter.calls(), 1);

    // Even if the flag shows up again, this controller resumes only once
    seed_interrupted_submission(&harness).await;
    let again = controller.mount().await.unwrap();
    assert!(again.resumed_finalize.is_none());
    controller.refresh().await;
    assert_eq!(harness.submitter.calls(), 1);

    // The user retries explicitly
    assert!(controller.finalize().await.is_submitted());
    assert_eq!(harness.submitter.calls(), 2);
}

#[tokio::test]
async fn test_flag_without_session_does_not_submit() {
    let harness = Harness::new();
    seed_interrupted_submission(&harness).await;

    let controller = harness.controller(proof_model(), None);
    let report = controller.mount().await.unwrap();
    assert!(matches!(report.resumed_finalize, Some(FinalizeOutcome::Failed(_))));
    assert_eq!(harness.submitter.calls(), 0);
}

// ============================================================================
// External snapshots & identity changes
// ============================================================================

#[tokio::test]
async fn test_external_snapshot_never_finalizes() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    controller.submit_current(CORE_PROMISE).await;

    let snapshot = PersistedUiState {
        current_question_key: Some(key("proof[0].description")),
        current_input_value: "From the other tab".to_string(),
        answered_questions: vec![key("corePromise"), key("proof[0].type")],
        answers: BTreeMap::from([(key("proof[0].type"), "statistic".to_string())]),
        is_finalizing: true,
    };
    let state = controller.apply_external_snapshot(snapshot).await;
    assert_eq!(state, asking("proof[0].description"));
    assert_eq!(controller.view().await.draft, "From the other tab");
    assert_eq!(harness.submitter.calls(), 0);
}

#[tokio::test]
async fn test_rebind_switches_workspace() {
    let harness = Harness::new();
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();
    controller.submit_current(CORE_PROMISE).await;

    assert!(!controller.rebind(Identity::new(WORKSPACE, None)).await);

    assert!(controller.rebind(Identity::new("ws-other", None)).await);
    let report = controller.mount().await.unwrap();
    assert_eq!(report.state, asking("corePromise"));
    assert_eq!(controller.identity().await.workspace_id, "ws-other");

    // The first workspace kept its progress
    assert!(harness
        .manager
        .load_snapshot(WORKSPACE, "proof_elements")
        .await
        .unwrap()
        .is_some());
}
