//! Wizard Service
//!
//! Resumable question sequencing for multi-step interview wizards. The pure
//! engine (Field Model, Sequencer, reconciliation) lives in
//! `wizard-flow-core`; this module drives it asynchronously.
//!
//! ## Architecture
//! - `controller.rs` - Submission Controller: one mounted step, single-flight answers
//! - `finalizer.rs` - Exactly-once submission of a completed step
//! - `persistence.rs` - UI snapshot and form-data mirroring with dedup
//! - `debounce.rs` - Generation-counted debounced writers
//! - `collaborators.rs` - Backend, storage and notification seams
//! - `store.rs` - SQLite-backed stores and the local step submitter
//! - `catalog/` - The wizard steps that ship with the engine

pub mod catalog;
pub mod collaborators;
pub mod controller;
pub mod debounce;
pub mod finalizer;
pub mod persistence;
pub mod store;

pub use collaborators::{
    FormDataStore, Notice, NoticeLevel, Notifier, SessionStore, SnapshotStore, StepSubmitter,
    SubmitResponse, TracingNotifier,
};
pub use controller::{
    Identity, MountReport, Prompt, SubmitOutcome, TranscriptLine, WizardController, WizardServices,
    WizardView,
};
pub use finalizer::FinalizeOutcome;
pub use persistence::{PersistenceBridge, SnapshotWrite};
pub use store::{LocalStepSubmitter, WizardStateManager};
