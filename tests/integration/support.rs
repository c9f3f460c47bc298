//! Test harness shared by the integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use wizard_flow::engine::{QuestionKey, StepPayload, WizardModel};
use wizard_flow::models::session::WizardSession;
use wizard_flow::services::wizard::catalog;
use wizard_flow::services::wizard::{
    Identity, LocalStepSubmitter, Notice, NoticeLevel, Notifier, SessionStore, StepSubmitter,
    SubmitResponse, WizardController, WizardServices, WizardStateManager,
};
use wizard_flow::storage::database::Database;
use wizard_flow::{AppError, AppResult, EngineConfig};

pub const WORKSPACE: &str = "ws-test";
pub const CORE_PROMISE: &str = "We deliver custom furniture in two weeks";

/// Submitter that counts calls, can fail the first few and can be held
/// mid-call
pub struct RecordingSubmitter {
    inner: LocalStepSubmitter,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    payloads: Mutex<Vec<StepPayload>>,
    paused: AtomicBool,
    entered: Notify,
    proceed: Notify,
}

impl RecordingSubmitter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn last_payload(&self) -> Option<StepPayload> {
        self.payloads.lock().unwrap().last().cloned()
    }

    /// Make the next call wait for `resume()`.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Wait until a paused call has reached the backend.
    pub async fn wait_until_called(&self) {
        self.entered.notified().await;
    }

    pub fn resume(&self) {
        self.proceed.notify_one();
    }
}

#[async_trait]
impl StepSubmitter for RecordingSubmitter {
    async fn submit_step(
        &self,
        session_id: &str,
        payload: &StepPayload,
    ) -> AppResult<SubmitResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if self.paused.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.proceed.notified().await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::submission("Backend unavailable (503)"));
        }
        self.inner.submit_step(session_id, payload).await
    }
}

/// Notifier that keeps every notice
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn levels(&self) -> Vec<NoticeLevel> {
        self.notices.lock().unwrap().iter().map(|n| n.level).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

pub struct Harness {
    pub manager: Arc<WizardStateManager>,
    pub submitter: Arc<RecordingSubmitter>,
    pub notifier: Arc<RecordingNotifier>,
    pub services: WizardServices,
    pub config: EngineConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::immediate())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let db = Database::new_in_memory().unwrap();
        let manager = Arc::new(WizardStateManager::from_database(&db));
        let submitter = Arc::new(RecordingSubmitter {
            inner: LocalStepSubmitter::new(manager.clone()),
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            entered: Notify::new(),
            proceed: Notify::new(),
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let services = WizardServices {
            submitter: submitter.clone(),
            snapshots: manager.clone(),
            form_data: manager.clone(),
            sessions: manager.clone(),
            notifier: notifier.clone(),
        };
        Self {
            manager,
            submitter,
            notifier,
            services,
            config,
        }
    }

    /// Create and store a fresh launch session
    pub async fn new_session(&self) -> WizardSession {
        let session = WizardSession::new(WORKSPACE, "launch", catalog::names());
        self.manager.save_session(&session).await.unwrap();
        session
    }

    pub async fn stored_session(&self, id: &str) -> WizardSession {
        self.manager.load_session(id).await.unwrap().unwrap()
    }

    pub fn controller(&self, model: WizardModel, session_id: Option<&str>) -> WizardController {
        WizardController::new(
            Arc::new(model),
            self.config.clone(),
            self.services.clone(),
            Identity::new(WORKSPACE, session_id.map(str::to_string)),
        )
    }
}

pub fn proof_model() -> WizardModel {
    catalog::proof_elements().unwrap()
}

pub fn pricing_model() -> WizardModel {
    catalog::pricing().unwrap()
}

pub fn key(raw: &str) -> QuestionKey {
    QuestionKey::parse(raw).unwrap()
}

/// Answer the first proof element completely, leaving the gate open.
pub async fn answer_first_proof(controller: &WizardController) {
    for answer in [CORE_PROMISE, "Testimonial", "Rated five stars by Jane", "skip"] {
        controller.submit_current(answer).await;
    }
}
