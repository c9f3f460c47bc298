//! Wizard Flow
//!
//! Resumable question-sequencing engine for guided interview wizards.
//! It includes:
//! - The wizard service (controller, finalizer, persistence bridge)
//! - Storage layer (SQLite, config file)
//! - Data models and utilities
//!
//! The deterministic engine itself is re-exported as [`engine`].

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use wizard_flow_core as engine;

pub use models::session::{StepRecord, WizardSession};
pub use models::settings::{EngineConfig, SettingsUpdate};
pub use services::wizard::{
    FinalizeOutcome, Identity, MountReport, SubmitOutcome, WizardController, WizardServices,
    WizardView,
};
pub use utils::error::{AppError, AppResult};
