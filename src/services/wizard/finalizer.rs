//! Finalizer
//!
//! Submits a fully answered step. At most one run is active per controller.
//! The `is_finalizing` flag is persisted synchronously before the backend
//! call so that a reload mid-submission resumes it, and it is cleared again
//! on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};

use wizard_flow_core::SequencerState;

use super::collaborators::Notice;
use super::controller::WizardController;
use super::persistence::SnapshotWrite;
use crate::utils::error::AppError;

/// Result of one `finalize()` call
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// The step was accepted by the backend
    Submitted,
    /// No values and no valid items; nothing was sent
    Empty,
    /// Another run is in progress
    AlreadyRunning,
    /// The wizard is not waiting to be finalized
    NotReady,
    /// Submission failed; local state is unchanged and a retry is possible
    Failed(AppError),
}

impl FinalizeOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

/// One-shot running guard
#[derive(Debug, Default)]
pub struct Finalizer {
    running: AtomicBool,
}

impl Finalizer {
    fn try_start(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(&self.running))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl WizardController {
    /// Submit the step if every question is answered.
    ///
    /// Also the retry path after a failed submission.
    pub async fn finalize(&self) -> FinalizeOutcome {
        let Some(_running) = self.finalizer.try_start() else {
            return FinalizeOutcome::AlreadyRunning;
        };
        let binding = self.binding().await;
        let step = self.model.step().to_string();

        let payload = {
            let state = self.state.lock().await;
            if state.is_completed() || state.current() != &SequencerState::Finalizing {
                return FinalizeOutcome::NotReady;
            }
            state.payload()
        };

        let has_session = self.session.lock().await.is_some();
        let session_id = match &binding.identity.session_id {
            Some(id) if has_session => id.clone(),
            _ => {
                let err = AppError::session_missing(format!(
                    "No active session for '{}'. Start or reload the wizard session, then submit again.",
                    step
                ));
                tracing::warn!("[Finalizer] {}", err);
                self.state.lock().await.set_error(err.to_string());
                self.services.notifier.notify(Notice::blocking(err.to_string()));
                return FinalizeOutcome::Failed(err);
            }
        };

        let write = {
            let mut state = self.state.lock().await;
            state.set_finalizing(true);
            state.clear_error();
            SnapshotWrite::desired(&state)
        };
        if let Err(e) = binding.bridge.persist_now(write).await {
            tracing::warn!("[Finalizer] Could not persist finalizing flag: {}", e);
        }

        if payload.is_empty() {
            tracing::info!("[Finalizer] Nothing to submit for '{}'", step);
            self.clear_finalizing().await;
            self.services
                .notifier
                .notify(Notice::info(format!("Nothing to submit for '{}'", step)));
            return FinalizeOutcome::Empty;
        }

        tracing::info!(
            "[Finalizer] Submitting '{}' for session {} ({} values, {} items)",
            step,
            session_id,
            payload.values.len(),
            payload.items.len()
        );

        let response = match self.services.submitter.submit_step(&session_id, &payload).await {
            Ok(response) => response,
            Err(e) => {
                let err = match e {
                    AppError::Submission(_) => e,
                    other => AppError::submission(other.to_string()),
                };
                tracing::warn!("[Finalizer] Submission of '{}' failed: {}", step, err);
                self.state.lock().await.set_error(err.to_string());
                self.clear_finalizing().await;
                self.services.notifier.notify(Notice::error(err.to_string()));
                return FinalizeOutcome::Failed(err);
            }
        };

        let data = self.state.lock().await.data().clone();
        let session = {
            let mut cached = self.session.lock().await;
            let updated = response.updated_record.or_else(|| cached.take());
            let Some(mut session) = updated else {
                drop(cached);
                self.clear_finalizing().await;
                return FinalizeOutcome::Failed(AppError::session_missing(
                    "Session vanished during submission",
                ));
            };
            if !session.is_step_completed(&step) {
                session.set_step_data(&step, data);
                session.complete_step(
                    &step,
                    serde_json::to_value(&payload).ok(),
                    response.suggestions.clone(),
                );
            } else if let Some(record) = session.step_mut(&step) {
                if record.suggestions.is_empty() {
                    record.suggestions = response.suggestions.clone();
                }
            }
            *cached = Some(session.clone());
            session
        };
        if let Err(e) = self.services.sessions.save_session(&session).await {
            tracing::warn!("[Finalizer] Could not save session {}: {}", session.id, e);
        }

        self.state.lock().await.mark_completed();
        if let Err(e) = binding.bridge.clear_form_data().await {
            tracing::warn!("[Finalizer] Could not clear form data: {}", e);
        }
        if let Err(e) = binding.bridge.persist_now(SnapshotWrite::Clear).await {
            tracing::warn!("[Finalizer] Could not clear snapshot: {}", e);
        }

        tracing::info!("[Finalizer] Step '{}' submitted", step);
        let mut message = format!("Saved '{}'", step);
        for suggestion in &response.suggestions {
            message.push_str("\n  - ");
            message.push_str(suggestion);
        }
        self.services.notifier.notify(Notice::info(message));
        FinalizeOutcome::Submitted
    }

    pub(super) async fn clear_finalizing(&self) {
        let binding = self.binding().await;
        let write = {
            let mut state = self.state.lock().await;
            state.set_finalizing(false);
            SnapshotWrite::desired(&state)
        };
        if let Err(e) = binding.bridge.persist_now(write).await {
            tracing::warn!("[Finalizer] Could not clear finalizing flag: {}", e);
        }
    }
}
