//! Wizard Catalog
//!
//! The wizard steps this engine ships with.

pub mod pricing;
pub mod proof;

use wizard_flow_core::WizardModel;

use crate::utils::error::{AppError, AppResult};

pub use pricing::pricing;
pub use proof::proof_elements;

/// Step names in the order a launch session asks them
pub fn names() -> &'static [&'static str] {
    &[proof::STEP, pricing::STEP]
}

/// Look up a step model by name
pub fn by_name(name: &str) -> AppResult<WizardModel> {
    match name {
        proof::STEP => proof_elements(),
        pricing::STEP => pricing(),
        other => Err(AppError::not_found(format!(
            "Unknown wizard step '{}' (available: {})",
            other,
            names().join(", ")
        ))),
    }
}
