//! Session Models
//!
//! The backend-owned record of one wizard run for a workspace: an ordered list
//! of steps, each with its collected data and completion state.

use serde::{Deserialize, Serialize};
use wizard_flow_core::StepData;

/// One step of a wizard session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Step key (matches the wizard model's step)
    pub key: String,
    /// Whether the step has been submitted
    #[serde(default)]
    pub completed: bool,
    /// Collected data
    #[serde(default)]
    pub data: StepData,
    /// Submitted payload as accepted by the backend
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Suggestions returned with the result
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl StepRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            completed: false,
            data: StepData::default(),
            result: None,
            suggestions: Vec::new(),
        }
    }
}

/// A wizard session within a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSession {
    /// Unique session identifier
    pub id: String,
    /// Tenant / workspace the session belongs to
    pub workspace_id: String,
    /// Wizard name (e.g. "proof_elements")
    pub wizard: String,
    /// Steps in order
    pub steps: Vec<StepRecord>,
    /// Index of the step the user is on
    pub current_step: usize,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl WizardSession {
    /// Create a new session with one record per step key
    pub fn new(workspace_id: impl Into<String>, wizard: impl Into<String>, step_keys: &[&str]) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            wizard: wizard.into(),
            steps: step_keys.iter().map(|key| StepRecord::new(*key)).collect(),
            current_step: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn step(&self, key: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.key == key)
    }

    pub fn step_mut(&mut self, key: &str) -> Option<&mut StepRecord> {
        self.steps.iter_mut().find(|s| s.key == key)
    }

    /// Key of the step the user is on, `None` once every step is done
    pub fn current_step_key(&self) -> Option<&str> {
        self.steps.get(self.current_step).map(|s| s.key.as_str())
    }

    /// Whether the given step has been submitted
    pub fn is_step_completed(&self, key: &str) -> bool {
        self.step(key).map_or(false, |s| s.completed)
    }

    /// Whether every step has been submitted
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.completed)
    }

    /// Replace a step's data (optimistic local update)
    pub fn set_step_data(&mut self, key: &str, data: StepData) -> bool {
        match self.step_mut(key) {
            Some(step) => {
                step.data = data;
                true
            }
            None => false,
        }
    }

    /// Mark a step completed and move `current_step` to the next open step.
    pub fn complete_step(
        &mut self,
        key: &str,
        result: Option<serde_json::Value>,
        suggestions: Vec<String>,
    ) -> bool {
        let Some(index) = self.steps.iter().position(|s| s.key == key) else {
            return false;
        };
        let step = &mut self.steps[index];
        step.completed = true;
        step.result = result;
        step.suggestions = suggestions;

        self.current_step = self
            .steps
            .iter()
            .enumerate()
            .skip(index + 1)
            .chain(self.steps.iter().enumerate().take(index + 1))
            .find(|(_, s)| !s.completed)
            .map_or(self.steps.len(), |(i, _)| i);
        self.touch();
        true
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
