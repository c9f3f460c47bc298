//! Submission Controller
//!
//! Owns one mounted wizard step. All state lives behind a single
//! `tokio::sync::Mutex<WizardState>`; no lock is held across an await.
//!
//! ## Submission ordering
//! 1. apply the answer (validation failures stop here, state untouched)
//! 2. update the cached session record, schedule the form-data write and
//!    re-observe the UI snapshot
//! 3. wait for the settle delay with the determining latch held; an answer
//!    that completes the step persists the finalizing flag first
//! 4. ask the sequencer for the next question; `Finalize` runs the Finalizer

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use wizard_flow_core::{
    Accepted, Advance, AnswerStatus, Choice, PersistedUiState, QuestionKey, RestoreInput, Rule,
    SequencerState, Slot, SlotKind, StepData, WizardModel, WizardState,
};

use super::collaborators::{FormDataStore, Notifier, SessionStore, SnapshotStore, StepSubmitter};
use super::finalizer::{FinalizeOutcome, Finalizer};
use super::persistence::{PersistenceBridge, SnapshotWrite};
use super::store::{LocalStepSubmitter, WizardStateManager};
use crate::models::session::WizardSession;
use crate::models::settings::EngineConfig;
use crate::storage::database::Database;
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// Wiring
// ============================================================================

/// External collaborators of a controller
#[derive(Clone)]
pub struct WizardServices {
    pub submitter: Arc<dyn StepSubmitter>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub form_data: Arc<dyn FormDataStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl WizardServices {
    /// Everything backed by one SQLite database, submitting locally
    pub fn sqlite(db: &Database, notifier: Arc<dyn Notifier>) -> Self {
        let manager = Arc::new(WizardStateManager::from_database(db));
        Self {
            submitter: Arc::new(LocalStepSubmitter::new(manager.clone())),
            snapshots: manager.clone(),
            form_data: manager.clone(),
            sessions: manager,
            notifier,
        }
    }
}

/// Who the wizard is running for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub workspace_id: String,
    pub session_id: Option<String>,
}

impl Identity {
    pub fn new(workspace_id: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            session_id,
        }
    }
}

pub(super) struct Binding {
    pub(super) identity: Identity,
    pub(super) bridge: PersistenceBridge,
}

// ============================================================================
// Outcomes & views
// ============================================================================

/// Result of one `submit()` call
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Another submission for the same key is in flight, or the step is
    /// being submitted
    Ignored,
    /// The answer failed validation; nothing changed
    Rejected(AppError),
    /// The answer was recorded; this is where the wizard now stands
    Advanced(SequencerState),
    /// The answer completed the step and it was submitted
    Completed,
    /// The answer completed the step but submission failed
    FinalizeFailed(AppError),
}

#[derive(Debug)]
pub struct MountReport {
    pub state: SequencerState,
    /// Outcome of the automatic resume of an interrupted submission
    pub resumed_finalize: Option<FinalizeOutcome>,
    /// The persisted question pointer was stale and dropped
    pub pointer_discarded: bool,
}

/// The active question as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub key: QuestionKey,
    pub label: String,
    pub required: bool,
    pub is_gate: bool,
    pub choices: Vec<Choice>,
}

/// One answered question in the transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLine {
    pub key: QuestionKey,
    pub label: String,
    pub status: AnswerStatus,
}

/// Read-only snapshot of a mounted step
#[derive(Debug, Clone, PartialEq)]
pub struct WizardView {
    pub step: String,
    pub state: SequencerState,
    pub prompt: Option<Prompt>,
    pub draft: String,
    pub transcript: Vec<TranscriptLine>,
    pub error: Option<String>,
    pub is_finalizing: bool,
    pub is_completed: bool,
}

// ============================================================================
// Single-flight guard
// ============================================================================

struct InFlightGuard<'a> {
    keys: &'a std::sync::Mutex<HashSet<QuestionKey>>,
    key: QuestionKey,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(keys: &'a std::sync::Mutex<HashSet<QuestionKey>>, key: &QuestionKey) -> Option<Self> {
        let inserted = keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone());
        inserted.then(|| Self {
            keys,
            key: key.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Marks the settle delay as owned by a live submission.
///
/// The determining latch inside `WizardState` cannot be released from
/// `Drop` (the state sits behind an async mutex), so a latch found held
/// while no guard is alive belongs to a cancelled submission and is lifted
/// by the next caller.
struct SettleGuard<'a>(&'a AtomicBool);

impl<'a> SettleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct WizardController {
    pub(super) model: Arc<WizardModel>,
    pub(super) config: EngineConfig,
    pub(super) services: WizardServices,
    pub(super) binding: RwLock<Arc<Binding>>,
    pub(super) state: Mutex<WizardState>,
    pub(super) session: Mutex<Option<WizardSession>>,
    pub(super) finalizer: Finalizer,
    in_flight: std::sync::Mutex<HashSet<QuestionKey>>,
    settling: AtomicBool,
    auto_finalize_spent: AtomicBool,
}

impl WizardController {
    pub fn new(
        model: Arc<WizardModel>,
        config: EngineConfig,
        services: WizardServices,
        identity: Identity,
    ) -> Self {
        let binding = Self::bind(&model, &config, &services, identity);
        Self {
            state: Mutex::new(WizardState::new(Arc::clone(&model))),
            model,
            config,
            services,
            binding: RwLock::new(Arc::new(binding)),
            session: Mutex::new(None),
            finalizer: Finalizer::default(),
            in_flight: std::sync::Mutex::new(HashSet::new()),
            settling: AtomicBool::new(false),
            auto_finalize_spent: AtomicBool::new(false),
        }
    }

    fn bind(
        model: &WizardModel,
        config: &EngineConfig,
        services: &WizardServices,
        identity: Identity,
    ) -> Binding {
        let bridge = PersistenceBridge::new(
            identity.workspace_id.clone(),
            model.step(),
            Arc::clone(&services.snapshots),
            Arc::clone(&services.form_data),
            config.snapshot_debounce(),
            config.form_data_debounce(),
        );
        Binding { identity, bridge }
    }

    pub fn model(&self) -> &Arc<WizardModel> {
        &self.model
    }

    pub(super) async fn binding(&self) -> Arc<Binding> {
        Arc::clone(&*self.binding.read().await)
    }

    pub async fn identity(&self) -> Identity {
        self.binding().await.identity.clone()
    }

    /// Cached copy of the session record
    pub async fn session(&self) -> Option<WizardSession> {
        self.session.lock().await.clone()
    }

    /// Point the controller at a different workspace or session.
    ///
    /// Pending writes for the old identity are flushed first. Returns false
    /// (and changes nothing) when the identity is unchanged. Call `mount()`
    /// afterwards.
    pub async fn rebind(&self, identity: Identity) -> bool {
        let current = self.binding().await;
        if current.identity == identity {
            return false;
        }
        if let Err(e) = current.bridge.flush().await {
            tracing::warn!("[Wizard] Flush before rebind failed: {}", e);
        }

        let binding = Self::bind(&self.model, &self.config, &self.services, identity);
        *self.binding.write().await = Arc::new(binding);
        *self.state.lock().await = WizardState::new(Arc::clone(&self.model));
        *self.session.lock().await = None;
        self.auto_finalize_spent.store(false, Ordering::SeqCst);
        true
    }

    // ========================================================================
    // Mount
    // ========================================================================

    /// Load the session, form-data cache and snapshot, reconcile them and
    /// position the wizard.
    ///
    /// If the snapshot shows a submission was interrupted and the step is
    /// still open, the Finalizer runs once. Later mounts of the same identity
    /// never repeat that.
    pub async fn mount(&self) -> AppResult<MountReport> {
        let binding = self.binding().await;
        if let Err(e) = binding.bridge.flush().await {
            tracing::warn!("[Wizard] Flush before mount failed: {}", e);
        }

        let session = match &binding.identity.session_id {
            Some(id) => self.services.sessions.load_session(id).await?,
            None => None,
        };
        let (record, step_completed) = session
            .as_ref()
            .and_then(|s| s.step(self.model.step()))
            .map(|step| (step.data.clone(), step.completed))
            .unwrap_or_default();

        let cache = binding.bridge.load_form_data().await.unwrap_or_else(|e| {
            tracing::warn!("[Wizard] Could not read form-data cache: {}", e);
            None
        });
        let snapshot = binding.bridge.load().await.unwrap_or_else(|e| {
            tracing::warn!("[Wizard] Could not read UI snapshot: {}", e);
            None
        });

        let restored = WizardState::restore(
            Arc::clone(&self.model),
            RestoreInput {
                record,
                cache,
                snapshot,
                step_completed,
            },
        );
        let pointer_discarded = restored.pointer_discarded;
        let resume = restored.resume_finalize && !self.auto_finalize_spent.swap(true, Ordering::SeqCst);

        *self.session.lock().await = session;
        let write = {
            let mut state = self.state.lock().await;
            *state = restored.state;
            let advance = state.advance();
            tracing::debug!("[Wizard] Mount advance for {}: {:?}", self.model.step(), advance);
            SnapshotWrite::desired(&state)
        };
        binding.bridge.observe(write).await;

        tracing::info!(
            "[Wizard] Mounted step '{}' for workspace {}",
            self.model.step(),
            binding.identity.workspace_id
        );

        let resumed_finalize = if resume {
            tracing::info!("[Wizard] Resuming interrupted submission of '{}'", self.model.step());
            Some(self.finalize().await)
        } else {
            None
        };

        Ok(MountReport {
            state: self.state.lock().await.current().clone(),
            resumed_finalize,
            pointer_discarded,
        })
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Submit an answer for `key`.
    ///
    /// Answers for other questions are still validated and recorded while
    /// an earlier submission waits out its settle delay; that submission
    /// then picks the next question for both. Nothing is accepted while the
    /// Finalizer is running.
    pub async fn submit(&self, key: &QuestionKey, raw: &str) -> SubmitOutcome {
        let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight, key) else {
            tracing::debug!("[Wizard] Submission for {} already in flight", key);
            return SubmitOutcome::Ignored;
        };
        let binding = self.binding().await;

        let (accepted, settle, completes_step, write, data) = {
            let mut state = self.state.lock().await;
            if self.finalizer.is_running() {
                tracing::debug!("[Wizard] Submission for {} ignored while finalizing", key);
                return SubmitOutcome::Ignored;
            }
            self.lift_stale_latch(&mut state);
            let was_finalizing = state.current() == &SequencerState::Finalizing;
            let accepted = match state.accept(key, raw) {
                Ok(accepted) => accepted,
                Err(e) => {
                    let err = AppError::from(e);
                    tracing::debug!("[Wizard] Rejected answer for {}: {}", key, err);
                    state.set_error(err.to_string());
                    return SubmitOutcome::Rejected(err);
                }
            };
            let settle = match &accepted {
                Accepted::ItemAdded { first, .. } => {
                    state.route_to(first.clone());
                    None
                }
                _ if state.is_determining() => None,
                _ => SettleGuard::acquire(&self.settling).map(|guard| {
                    state.hold();
                    guard
                }),
            };
            // Persisted right away so a reload during the settle delay
            // still submits the step.
            let completes_step =
                !was_finalizing && !state.is_finalizing() && state.is_fully_answered();
            if completes_step {
                state.set_finalizing(true);
            }
            let write = SnapshotWrite::desired(&state);
            (accepted, settle, completes_step, write, state.data().clone())
        };
        tracing::debug!("[Wizard] Accepted {:?}", accepted);

        self.cache_step_data(data.clone()).await;
        binding.bridge.schedule_form_data(data).await;
        if completes_step {
            if let Err(e) = binding.bridge.persist_now(write).await {
                tracing::warn!("[Wizard] Could not persist finalizing flag: {}", e);
            }
        } else {
            binding.bridge.observe(write).await;
        }

        let Some(settle) = settle else {
            return SubmitOutcome::Advanced(self.state.lock().await.current().clone());
        };

        tokio::time::sleep(self.config.settle_delay()).await;

        let (advance, current, write, flag_dropped) = {
            let mut state = self.state.lock().await;
            state.release();
            drop(settle);
            let advance = state.advance();
            let flag_dropped = advance != Advance::Finalize
                && state.is_finalizing()
                && !self.finalizer.is_running();
            if flag_dropped {
                state.set_finalizing(false);
            }
            (advance, state.current().clone(), SnapshotWrite::desired(&state), flag_dropped)
        };
        tracing::debug!("[Wizard] Next for {}: {:?}", self.model.step(), advance);
        if flag_dropped {
            if let Err(e) = binding.bridge.persist_now(write).await {
                tracing::warn!("[Wizard] Could not clear finalizing flag: {}", e);
            }
        } else {
            binding.bridge.observe(write).await;
        }

        match advance {
            Advance::Finalize => match self.finalize().await {
                FinalizeOutcome::Submitted => SubmitOutcome::Completed,
                FinalizeOutcome::Failed(e) => SubmitOutcome::FinalizeFailed(e),
                FinalizeOutcome::NotReady => {
                    self.clear_finalizing().await;
                    SubmitOutcome::Advanced(self.state.lock().await.current().clone())
                }
                FinalizeOutcome::Empty | FinalizeOutcome::AlreadyRunning => {
                    SubmitOutcome::Advanced(self.state.lock().await.current().clone())
                }
            },
            _ => SubmitOutcome::Advanced(current),
        }
    }

    /// Release a determining latch whose submission was dropped mid-delay.
    fn lift_stale_latch(&self, state: &mut WizardState) {
        if state.is_determining() && !self.settling.load(Ordering::SeqCst) {
            tracing::warn!("[Wizard] Releasing determining latch of a cancelled submission");
            state.release();
        }
    }

    /// Submit an answer for whatever question is active.
    pub async fn submit_current(&self, raw: &str) -> SubmitOutcome {
        let key = self.state.lock().await.current().active_key().cloned();
        match key {
            Some(key) => self.submit(&key, raw).await,
            None => SubmitOutcome::Ignored,
        }
    }

    /// Update the typed-but-unsubmitted text for the active question.
    pub async fn set_draft(&self, text: &str) -> bool {
        let binding = self.binding().await;
        let write = {
            let mut state = self.state.lock().await;
            if !state.set_draft(text) {
                return false;
            }
            SnapshotWrite::desired(&state)
        };
        binding.bridge.observe(write).await;
        true
    }

    // ========================================================================
    // Rendering & maintenance
    // ========================================================================

    /// Re-run the sequencer (a re-render). Never re-triggers a finalize.
    pub async fn refresh(&self) -> SequencerState {
        let binding = self.binding().await;
        let (current, write) = {
            let mut state = self.state.lock().await;
            self.lift_stale_latch(&mut state);
            let advance = state.advance();
            tracing::debug!("[Wizard] Refresh of {}: {:?}", self.model.step(), advance);
            (state.current().clone(), SnapshotWrite::desired(&state))
        };
        binding.bridge.observe(write).await;
        current
    }

    /// Clear one item of the repeatable group and ask its fields again.
    pub async fn reset_item(&self, index: usize) -> AppResult<SequencerState> {
        let binding = self.binding().await;
        let (current, write, data) = {
            let mut state = self.state.lock().await;
            if self.finalizer.is_running() {
                return Err(AppError::validation(
                    "The step is being submitted; wait for it to finish",
                ));
            }
            self.lift_stale_latch(&mut state);
            state.reset_item(index)?;
            state.advance();
            (state.current().clone(), SnapshotWrite::desired(&state), state.data().clone())
        };
        tracing::info!("[Wizard] Reset item {} of '{}'", index, self.model.step());
        self.cache_step_data(data.clone()).await;
        binding.bridge.schedule_form_data(data).await;
        binding.bridge.observe(write).await;
        Ok(current)
    }

    /// Throw away every answer of this step and start over.
    pub async fn restart(&self) -> SequencerState {
        let binding = self.binding().await;
        let (current, write, data) = {
            let mut state = self.state.lock().await;
            if self.finalizer.is_running() {
                tracing::debug!("[Wizard] Restart ignored while finalizing");
                return state.current().clone();
            }
            state.restart();
            state.advance();
            (state.current().clone(), SnapshotWrite::desired(&state), state.data().clone())
        };
        tracing::info!("[Wizard] Restarted '{}'", self.model.step());
        self.cache_step_data(data.clone()).await;
        binding.bridge.schedule_form_data(data).await;
        binding.bridge.observe(write).await;
        current
    }

    /// Adopt a snapshot written elsewhere (another tab, another device).
    pub async fn apply_external_snapshot(&self, snapshot: PersistedUiState) -> SequencerState {
        let binding = self.binding().await;
        let (current, write) = {
            let mut state = self.state.lock().await;
            let restored = WizardState::restore(
                Arc::clone(&self.model),
                RestoreInput {
                    record: state.data().clone(),
                    cache: None,
                    snapshot: Some(snapshot.clone()),
                    step_completed: state.is_completed(),
                },
            );
            *state = restored.state;
            state.advance();
            (state.current().clone(), SnapshotWrite::desired(&state))
        };
        binding.bridge.note_external(snapshot).await;
        binding.bridge.observe(write).await;
        current
    }

    /// Drain the debounced writers.
    pub async fn flush(&self) -> AppResult<()> {
        self.binding().await.bridge.flush().await
    }

    /// Read-only view of the step.
    pub async fn view(&self) -> WizardView {
        let state = self.state.lock().await;
        let data = state.data();

        let prompt = state.current().active_key().and_then(|key| {
            let slot = self.model.locate(key, data)?;
            let (label, required, choices) = self.describe(&slot);
            Some(Prompt {
                key: key.clone(),
                label,
                required,
                is_gate: matches!(slot.kind, SlotKind::Gate { .. }),
                choices,
            })
        });

        let transcript = self
            .model
            .slots(data)
            .into_iter()
            .filter(|slot| state.answered().contains(&slot.key))
            .map(|slot| TranscriptLine {
                label: self.describe(&slot).0,
                status: state.answer_status(&slot.key),
                key: slot.key,
            })
            .collect();

        WizardView {
            step: self.model.step().to_string(),
            state: state.current().clone(),
            prompt,
            draft: state.draft().to_string(),
            transcript,
            error: state.error().map(str::to_string),
            is_finalizing: state.is_finalizing(),
            is_completed: state.is_completed(),
        }
    }

    fn describe(&self, slot: &Slot) -> (String, bool, Vec<Choice>) {
        match slot.kind {
            SlotKind::Gate { .. } => {
                let label = self
                    .model
                    .group()
                    .map(|g| g.gate_label.clone())
                    .unwrap_or_default();
                (label, true, Vec::new())
            }
            kind => match self.model.field(kind) {
                Some(field) => {
                    let label = match kind {
                        SlotKind::Item { index, .. } => format!("{} #{}", field.label, index + 1),
                        _ => field.label.clone(),
                    };
                    let choices = match &field.rule {
                        Rule::Choice { options } => options.clone(),
                        Rule::YesNo => vec![Choice::new("yes", "Yes"), Choice::new("no", "No")],
                        _ => Vec::new(),
                    };
                    (label, field.is_required(), choices)
                }
                None => (slot.key.to_string(), false, Vec::new()),
            },
        }
    }

    async fn cache_step_data(&self, data: StepData) {
        if let Some(session) = self.session.lock().await.as_mut() {
            session.set_step_data(self.model.step(), data);
        }
    }
}

impl std::fmt::Debug for WizardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardController")
            .field("step", &self.model.step())
            .finish()
    }
}
