//! Services
//!
//! Business logic services for the application.

pub mod wizard;

pub use wizard::{WizardController, WizardServices, WizardStateManager};
