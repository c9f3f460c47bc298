//! Wizard Flow Core
//!
//! Pure question-sequencing logic for resumable interview wizards. This crate
//! has no I/O: storage, submission and timing live in the application crate.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `classifier` - Skip / affirmative / literal classification of raw answers
//! - `key` - Stable question keys (`price`, `proof[0].type`, `ask-more-proof[1]`)
//! - `field` - Field specs and validation rules
//! - `data` - The step data record
//! - `model` - Ordered question model and traversal
//! - `sequencer` - Next-question state machine
//! - `state` - In-memory wizard state, snapshot and reload reconciliation
//! - `payload` - Filtered payload submitted on finalize

pub mod classifier;
pub mod data;
pub mod error;
pub mod field;
pub mod key;
pub mod model;
pub mod payload;
pub mod sequencer;
pub mod state;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Answers & Keys ─────────────────────────────────────────────────────
pub use classifier::{classify, is_negative, Classification, AFFIRMATIVE_WORDS, SKIP_WORDS};
pub use key::{KeyShape, QuestionKey};

// ── Model ──────────────────────────────────────────────────────────────
pub use data::StepData;
pub use field::{Choice, FieldSpec, Requirement, Resolved, Rule};
pub use model::{RepeatableGroup, Slot, SlotKind, WizardModel, WizardModelBuilder};

// ── Sequencing & State ─────────────────────────────────────────────────
pub use payload::StepPayload;
pub use sequencer::{Advance, Sequencer, SequencerState};
pub use state::{
    Accepted, AnswerStatus, PersistedUiState, RestoreInput, Restored, WizardState,
};
