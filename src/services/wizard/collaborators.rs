//! Collaborators
//!
//! The seams between the wizard engine and the outside world: step
//! submission, snapshot and form-data storage, session storage and user
//! notices. Everything is a `Send + Sync` async trait so the controller can
//! be driven against SQLite, an HTTP backend or test doubles alike.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wizard_flow_core::{PersistedUiState, StepData, StepPayload};

use crate::models::session::WizardSession;
use crate::utils::error::AppResult;

// ============================================================================
// Submission
// ============================================================================

/// Backend response to a step submission
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// The session as the backend now sees it, if it returns one
    #[serde(default)]
    pub updated_record: Option<WizardSession>,
    /// Follow-up suggestions stored alongside the step result
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[async_trait]
pub trait StepSubmitter: Send + Sync {
    /// Submit one finalized step for a session.
    async fn submit_step(&self, session_id: &str, payload: &StepPayload)
        -> AppResult<SubmitResponse>;
}

// ============================================================================
// Storage
// ============================================================================

/// Per-(workspace, step) UI snapshot storage
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load_snapshot(
        &self,
        workspace_id: &str,
        step_key: &str,
    ) -> AppResult<Option<PersistedUiState>>;

    async fn save_snapshot(
        &self,
        workspace_id: &str,
        step_key: &str,
        snapshot: &PersistedUiState,
    ) -> AppResult<()>;

    async fn clear_snapshot(&self, workspace_id: &str, step_key: &str) -> AppResult<()>;
}

/// Per-(workspace, step) form-data cache
#[async_trait]
pub trait FormDataStore: Send + Sync {
    async fn load_form_data(&self, workspace_id: &str, step_key: &str)
        -> AppResult<Option<StepData>>;

    async fn save_form_data(&self, workspace_id: &str, step_key: &str, data: &StepData)
        -> AppResult<()>;

    async fn clear_form_data(&self, workspace_id: &str, step_key: &str) -> AppResult<()>;
}

/// Session record storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, session_id: &str) -> AppResult<Option<WizardSession>>;

    async fn save_session(&self, session: &WizardSession) -> AppResult<()>;

    /// Most recently updated session of a wizard in a workspace
    async fn latest_session(&self, workspace_id: &str, wizard: &str)
        -> AppResult<Option<WizardSession>>;
}

// ============================================================================
// Notices
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
    /// Needs user action before anything else can happen
    Blocking,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!("[Notice] {}", notice.message),
            NoticeLevel::Warning => tracing::warn!("[Notice] {}", notice.message),
            NoticeLevel::Error | NoticeLevel::Blocking => {
                tracing::error!("[Notice] {}", notice.message)
            }
        }
    }
}
