//! Wizard Flow Integration Tests
//!
//! Answering a step from the first question through submission:
//! - validation failures leave everything in place
//! - skips versus literal answers
//! - the "add more" loop and its item routing
//! - single in-flight submission and cancelled submissions
//! - resetting a group item

use std::time::Duration;

use wizard_flow::engine::{AnswerStatus, SequencerState};
use wizard_flow::services::wizard::{FinalizeOutcome, SnapshotStore, SubmitOutcome};
use wizard_flow::{AppError, EngineConfig};

use super::support::*;

fn asking(key_str: &str) -> SequencerState {
    SequencerState::Asking {
        key: key(key_str),
        prefill: String::new(),
    }
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_short_core_promise_is_rejected() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();

    let outcome = controller.submit(&key("corePromise"), "Too short").await;
    assert!(matches!(outcome, SubmitOutcome::Rejected(AppError::Validation(_))));

    let view = controller.view().await;
    assert_eq!(view.state, asking("corePromise"));
    assert!(view.transcript.is_empty());
    assert!(view.error.unwrap().contains("at least 20"));

    // "ok" reads as an acknowledgement, not an answer
    let outcome = controller.submit(&key("corePromise"), "ok").await;
    assert!(matches!(outcome, SubmitOutcome::Rejected(AppError::Validation(_))));
    let view = controller.view().await;
    assert!(view.transcript.is_empty());
    assert!(view.error.is_some());

    // A valid answer clears the error slot
    controller.submit(&key("corePromise"), CORE_PROMISE).await;
    let view = controller.view().await;
    assert!(view.error.is_none());
    assert_eq!(view.state, asking("proof[0].type"));
}

#[tokio::test]
async fn test_required_field_refuses_skip() {
    let harness = Harness::new();
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();

    let outcome = controller.submit_current("skip").await;
    assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    assert_eq!(controller.view().await.state, asking("corePromise"));
}

#[tokio::test]
async fn test_unknown_key_is_rejected() {
    let harness = Harness::new();
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();

    let outcome = controller.submit(&key("proof[4].type"), "award").await;
    assert!(matches!(outcome, SubmitOutcome::Rejected(AppError::NotFound(_))));
}

// ============================================================================
// Skip versus literal
// ============================================================================

#[tokio::test]
async fn test_blank_optional_url_counts_as_skipped() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();

    for answer in [CORE_PROMISE, "Testimonial", "Rated five stars by Jane"] {
        controller.submit_current(answer).await;
    }
    let outcome = controller.submit(&key("proof[0].url"), "  ").await;
    assert!(matches!(outcome, SubmitOutcome::Advanced(_)));

    let view = controller.view().await;
    let url = view
        .transcript
        .iter()
        .find(|line| line.key == key("proof[0].url"))
        .unwrap();
    assert_eq!(url.status, AnswerStatus::Skipped);

    let cached = controller.session().await.unwrap();
    let data = &cached.step("proof_elements").unwrap().data;
    assert_eq!(data.item_value(0, "url"), "");
    assert_eq!(view.state, asking("ask-more-proof[1]"));
}

#[tokio::test]
async fn test_skipped_price_hides_its_description() {
    let harness = Harness::new();
    let controller = harness.controller(pricing_model(), None);
    controller.mount().await.unwrap();

    controller.submit_current("skip").await;
    let view = controller.view().await;
    assert_eq!(view.state, asking("offersTrial"));
    assert_eq!(view.transcript[0].status, AnswerStatus::Skipped);
}

#[tokio::test]
async fn test_literal_zero_price_is_an_answer() {
    let harness = Harness::new();
    let controller = harness.controller(pricing_model(), None);
    controller.mount().await.unwrap();

    controller.submit_current("0").await;
    let view = controller.view().await;
    assert_eq!(view.state, asking("priceDescription"));
    assert_eq!(view.transcript[0].status, AnswerStatus::Answered("0".to_string()));

    // Affirmative words on an optional text field are kept as text
    controller.submit_current("yes").await;
    let view = controller.view().await;
    assert_eq!(view.transcript[1].status, AnswerStatus::Answered("yes".to_string()));
    assert_eq!(view.state, asking("offersTrial"));
}

#[tokio::test]
async fn test_type_matching_ignores_case() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    controller.submit_current(CORE_PROMISE).await;

    let type_key = key("proof[0].type");
    controller.submit(&type_key, "Testimonial").await;
    let first = controller.session().await.unwrap();
    assert_eq!(first.step("proof_elements").unwrap().data.item_value(0, "type"), "testimonial");

    controller.submit(&type_key, "testimonial").await;
    let second = controller.session().await.unwrap();
    assert_eq!(second.step("proof_elements").unwrap().data.item_value(0, "type"), "testimonial");

    // Re-answering an earlier question does not move the wizard
    assert_eq!(controller.view().await.state, asking("proof[0].description"));
}

// ============================================================================
// Repeatable group
// ============================================================================

#[tokio::test]
async fn test_gate_yes_routes_to_new_item() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    assert_eq!(controller.view().await.state, asking("ask-more-proof[1]"));

    let outcome = controller.submit_current("yes").await;
    match outcome {
        SubmitOutcome::Advanced(state) => assert_eq!(state, asking("proof[1].type")),
        other => panic!("unexpected outcome {:?}", other),
    }

    let cached = controller.session().await.unwrap();
    assert_eq!(cached.step("proof_elements").unwrap().data.items.len(), 2);

    let view = controller.view().await;
    let prompt = view.prompt.unwrap();
    assert_eq!(prompt.label, "Proof type #2");
    assert_eq!(prompt.choices.len(), 5);
}

#[tokio::test]
async fn test_gate_no_then_skip_notes_submits_once() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;

    let outcome = controller.submit_current("no").await;
    assert!(matches!(outcome, SubmitOutcome::Advanced(ref s) if *s == asking("notes")));
    assert_eq!(harness.submitter.calls(), 0);

    let outcome = controller.submit_current("skip").await;
    assert!(matches!(outcome, SubmitOutcome::Completed));
    assert_eq!(harness.submitter.calls(), 1);

    let view = controller.view().await;
    assert!(view.is_completed);
    assert_eq!(view.state, SequencerState::Done);

    // Re-rendering a finished step submits nothing
    controller.refresh().await;
    assert!(matches!(controller.finalize().await, FinalizeOutcome::NotReady));
    assert_eq!(harness.submitter.calls(), 1);

    let payload = harness.submitter.last_payload().unwrap();
    assert_eq!(payload.values.get("corePromise").map(String::as_str), Some(CORE_PROMISE));
    assert_eq!(payload.items.len(), 1);
    assert_eq!(payload.items[0].get("type").map(String::as_str), Some("testimonial"));
    assert!(!payload.items[0].contains_key("url"));
    assert!(payload.skipped.contains(&key("notes")));

    let stored = harness.stored_session(&session.id).await;
    assert!(stored.is_step_completed("proof_elements"));
    assert_eq!(stored.current_step_key(), Some("pricing"));
    assert!(harness
        .manager
        .load_snapshot(WORKSPACE, "proof_elements")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_abandoned_item_is_left_out_of_payload() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;

    controller.submit_current("yes").await;
    controller.submit_current("award").await;
    // Leave the second item half answered
    controller.submit(&key("proof[1].description"), "short").await;
    let view = controller.view().await;
    assert_eq!(view.state, asking("proof[1].description"));
    assert!(view.error.is_some());

    let stored = controller.session().await.unwrap();
    let payload = wizard_flow::engine::StepPayload::build(
        controller.model(),
        &stored.step("proof_elements").unwrap().data,
        &Default::default(),
    );
    assert_eq!(payload.items.len(), 1);
}

#[tokio::test]
async fn test_reset_item_asks_its_fields_again() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    controller.submit_current("yes").await;
    controller.submit_current("award").await;

    let state = controller.reset_item(0).await.unwrap();
    assert_eq!(state, asking("proof[0].type"));

    let view = controller.view().await;
    assert!(view.transcript.iter().all(|line| !line.key.as_str().starts_with("proof[0].")));
    assert!(view.transcript.iter().any(|line| line.key == key("proof[1].type")));

    let cached = controller.session().await.unwrap();
    let data = &cached.step("proof_elements").unwrap().data;
    assert_eq!(data.item_value(0, "type"), "");
    assert_eq!(data.item_value(1, "type"), "award");

    assert!(controller.reset_item(9).await.is_err());
}

#[tokio::test]
async fn test_restart_clears_everything() {
    let harness = Harness::new();
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;

    let state = controller.restart().await;
    assert_eq!(state, asking("corePromise"));
    assert!(controller.view().await.transcript.is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_duplicate_submission_is_ignored() {
    let harness = Harness::with_config(EngineConfig {
        settle_delay_ms: 50,
        ..EngineConfig::immediate()
    });
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();

    let core_promise = key("corePromise");
    let (first, second) = tokio::join!(
        controller.submit(&core_promise, CORE_PROMISE),
        controller.submit(&core_promise, CORE_PROMISE)
    );
    assert!(matches!(first, SubmitOutcome::Advanced(_)));
    assert!(matches!(second, SubmitOutcome::Ignored));
    assert_eq!(controller.view().await.state, asking("proof[0].type"));
}

#[tokio::test]
async fn test_other_answers_are_recorded_while_settling() {
    let harness = Harness::with_config(EngineConfig {
        settle_delay_ms: 50,
        ..EngineConfig::immediate()
    });
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();

    let core_promise = key("corePromise");
    let proof_type = key("proof[0].type");
    let description = key("proof[0].description");
    let (first, second, third) = tokio::join!(
        controller.submit(&core_promise, CORE_PROMISE),
        controller.submit(&proof_type, "award"),
        controller.submit(&description, "short")
    );
    assert!(matches!(first, SubmitOutcome::Advanced(_)));
    assert!(matches!(second, SubmitOutcome::Advanced(_)));
    assert!(matches!(third, SubmitOutcome::Rejected(AppError::Validation(_))));

    // One determination covers both recorded answers
    let view = controller.view().await;
    assert_eq!(view.transcript.len(), 2);
    assert_eq!(view.state, asking("proof[0].description"));
}

#[tokio::test]
async fn test_cancelled_submission_releases_determining_latch() {
    let harness = Harness::with_config(EngineConfig {
        settle_delay_ms: 50,
        ..EngineConfig::immediate()
    });
    let controller = harness.controller(proof_model(), None);
    controller.mount().await.unwrap();

    let core_promise = key("corePromise");
    let cancelled = tokio::time::timeout(
        Duration::from_millis(5),
        controller.submit(&core_promise, CORE_PROMISE),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(controller
        .view()
        .await
        .transcript
        .iter()
        .any(|line| line.key == core_promise));

    assert_eq!(controller.refresh().await, asking("proof[0].type"));
    let outcome = controller.submit_current("award").await;
    assert!(matches!(outcome, SubmitOutcome::Advanced(ref s) if *s == asking("proof[0].description")));
}

#[tokio::test]
async fn test_answers_are_refused_while_submitting() {
    let harness = Harness::new();
    let session = harness.new_session().await;
    let controller = harness.controller(proof_model(), Some(&session.id));
    controller.mount().await.unwrap();
    answer_first_proof(&controller).await;
    controller.submit_current("no").await;
    harness.submitter.pause();

    let core_promise = key("corePromise");
    let (last, (late, reset)) = tokio::join!(controller.submit_current("skip"), async {
        harness.submitter.wait_until_called().await;
        let late = controller
            .submit(&core_promise, "A totally different promise mid submit")
            .await;
        let reset = controller.reset_item(0).await;
        harness.submitter.resume();
        (late, reset)
    });
    assert!(matches!(last, SubmitOutcome::Completed));
    assert!(matches!(late, SubmitOutcome::Ignored));
    assert!(reset.is_err());

    let payload = harness.submitter.last_payload().unwrap();
    assert_eq!(payload.values.get("corePromise").map(String::as_str), Some(CORE_PROMISE));
    let stored = harness.stored_session(&session.id).await;
    let data = &stored.step("proof_elements").unwrap().data;
    assert_eq!(data.value("corePromise"), CORE_PROMISE);
    assert_eq!(data.item_value(0, "type"), "testimonial");
}

#[tokio::test]
async fn test_draft_only_while_asking() {
    let harness = Harness::new();
    let controller = harness.controller(proof_model(), None);
    assert!(!controller.set_draft("too early").await);

    controller.mount().await.unwrap();
    assert!(controller.set_draft("We deliver").await);
    assert_eq!(controller.view().await.draft, "We deliver");

    controller.submit_current(CORE_PROMISE).await;
    assert_eq!(controller.view().await.draft, "");
}
