//! Configuration File
//!
//! `EngineConfig` persisted as pretty JSON. A missing file is created with
//! defaults; a file that fails validation is an error rather than being
//! silently replaced.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::{EngineConfig, SettingsUpdate};
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, ensure_dir};

#[derive(Debug)]
pub struct ConfigService {
    path: PathBuf,
    config: EngineConfig,
}

impl ConfigService {
    /// Load ~/.wizard-flow/config.json
    pub fn new() -> AppResult<Self> {
        Self::with_path(config_path()?)
    }

    pub fn with_path(path: PathBuf) -> AppResult<Self> {
        let config = if path.exists() {
            read(&path)?
        } else {
            let config = EngineConfig::default();
            write(&path, &config)?;
            tracing::info!("[Config] Wrote defaults to {}", path.display());
            config
        };
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a partial update and write it out. Invalid updates change nothing.
    pub fn update(&mut self, update: SettingsUpdate) -> AppResult<&EngineConfig> {
        let mut next = self.config.clone();
        next.apply_update(update);
        write(&self.path, &next)?;
        self.config = next;
        Ok(&self.config)
    }

    /// Re-read the file, e.g. after it was edited by hand
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = read(&self.path)?;
        Ok(())
    }

    pub fn reset(&mut self) -> AppResult<()> {
        let defaults = EngineConfig::default();
        write(&self.path, &defaults)?;
        self.config = defaults;
        Ok(())
    }
}

fn read(path: &Path) -> AppResult<EngineConfig> {
    let content = fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    config
        .validate()
        .map_err(|e| AppError::config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

fn write(path: &Path, config: &EngineConfig) -> AppResult<()> {
    config.validate().map_err(AppError::config)?;
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
