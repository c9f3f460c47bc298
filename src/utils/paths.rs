//! Paths
//!
//! Config and database live under ~/.wizard-flow/, or under
//! `$WIZARD_FLOW_HOME` when that is set.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Overrides the data directory
pub const HOME_ENV: &str = "WIZARD_FLOW_HOME";

pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

pub fn wizard_flow_dir() -> AppResult<PathBuf> {
    match std::env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => Ok(home_dir()?.join(".wizard-flow")),
    }
}

/// Get the config file path (~/.wizard-flow/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(wizard_flow_dir()?.join("config.json"))
}

/// Get the default database file path (~/.wizard-flow/wizard.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(wizard_flow_dir()?.join("wizard.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
