//! Settings Models
//!
//! Engine configuration and settings data structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound for every configured delay
pub const MAX_DELAY_MS: u64 = 5_000;

/// Lower bound for the form-data debounce
pub const MIN_FORM_DATA_DEBOUNCE_MS: u64 = 10;

/// Engine configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Debounce for the local form-data cache
    #[serde(default = "default_form_data_debounce_ms")]
    pub form_data_debounce_ms: u64,
    /// Debounce for UI snapshot writes
    #[serde(default = "default_snapshot_debounce_ms")]
    pub snapshot_debounce_ms: u64,
    /// Pause between applying an answer and choosing the next question
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// tracing EnvFilter directive used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Database file override; defaults to ~/.wizard-flow/wizard.db
    #[serde(default)]
    pub database_path: Option<String>,
}

fn default_form_data_debounce_ms() -> u64 {
    100
}

fn default_snapshot_debounce_ms() -> u64 {
    250
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_log_filter() -> String {
    "info,wizard_flow=debug".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            form_data_debounce_ms: default_form_data_debounce_ms(),
            snapshot_debounce_ms: default_snapshot_debounce_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            log_filter: default_log_filter(),
            database_path: None,
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub form_data_debounce_ms: Option<u64>,
    pub snapshot_debounce_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub log_filter: Option<String>,
    /// `Some(None)` clears the override
    pub database_path: Option<Option<String>>,
}

impl EngineConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(ms) = update.form_data_debounce_ms {
            self.form_data_debounce_ms = ms;
        }
        if let Some(ms) = update.snapshot_debounce_ms {
            self.snapshot_debounce_ms = ms;
        }
        if let Some(ms) = update.settle_delay_ms {
            self.settle_delay_ms = ms;
        }
        if let Some(filter) = update.log_filter {
            self.log_filter = filter;
        }
        if let Some(path) = update.database_path {
            self.database_path = path;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.form_data_debounce_ms < MIN_FORM_DATA_DEBOUNCE_MS {
            return Err(format!(
                "form_data_debounce_ms must be at least {} ms",
                MIN_FORM_DATA_DEBOUNCE_MS
            ));
        }

        for (name, value) in [
            ("form_data_debounce_ms", self.form_data_debounce_ms),
            ("snapshot_debounce_ms", self.snapshot_debounce_ms),
            ("settle_delay_ms", self.settle_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(format!("{} cannot exceed {} ms", name, MAX_DELAY_MS));
            }
        }

        if self.log_filter.trim().is_empty() {
            return Err("log_filter cannot be empty".to_string());
        }

        if let Some(path) = &self.database_path {
            if path.trim().is_empty() {
                return Err("database_path cannot be blank".to_string());
            }
        }

        Ok(())
    }

    pub fn form_data_debounce(&self) -> Duration {
        Duration::from_millis(self.form_data_debounce_ms)
    }

    pub fn snapshot_debounce(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Zero delays everywhere, for tests
    pub fn immediate() -> Self {
        Self {
            form_data_debounce_ms: MIN_FORM_DATA_DEBOUNCE_MS,
            snapshot_debounce_ms: 0,
            settle_delay_ms: 0,
            ..Self::default()
        }
    }
}
