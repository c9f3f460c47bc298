//! Persistence Bridge
//!
//! Mirrors the wizard's UI state into the snapshot store and the collected
//! data into the form-data cache. Snapshot writes are deduplicated against
//! the last write emitted, so re-rendering an unchanged state never touches
//! storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use wizard_flow_core::{PersistedUiState, StepData, WizardState};

use super::collaborators::{FormDataStore, SnapshotStore};
use super::debounce::{Debouncer, WriteSink};
use crate::utils::error::AppResult;

// ============================================================================
// Write values
// ============================================================================

/// A desired snapshot write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotWrite {
    Put(PersistedUiState),
    Clear,
}

impl SnapshotWrite {
    /// The write that brings storage in line with `state`.
    ///
    /// A completed step, or one with nothing answered, nothing typed and no
    /// submission pending, has nothing worth resuming.
    pub fn desired(state: &WizardState) -> Self {
        if state.is_completed() || !state.is_meaningful() {
            Self::Clear
        } else {
            Self::Put(state.snapshot())
        }
    }
}

/// A desired form-data write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormDataWrite {
    Put(StepData),
    Clear,
}

// ============================================================================
// Sinks
// ============================================================================

struct SnapshotSink {
    store: Arc<dyn SnapshotStore>,
    workspace_id: String,
    step_key: String,
}

#[async_trait]
impl WriteSink<SnapshotWrite> for SnapshotSink {
    async fn write(&self, value: SnapshotWrite) -> AppResult<()> {
        match value {
            SnapshotWrite::Put(snapshot) => {
                self.store
                    .save_snapshot(&self.workspace_id, &self.step_key, &snapshot)
                    .await
            }
            SnapshotWrite::Clear => {
                self.store
                    .clear_snapshot(&self.workspace_id, &self.step_key)
                    .await
            }
        }
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

struct FormDataSink {
    store: Arc<dyn FormDataStore>,
    workspace_id: String,
    step_key: String,
}

#[async_trait]
impl WriteSink<FormDataWrite> for FormDataSink {
    async fn write(&self, value: FormDataWrite) -> AppResult<()> {
        match value {
            FormDataWrite::Put(data) => {
                self.store
                    .save_form_data(&self.workspace_id, &self.step_key, &data)
                    .await
            }
            FormDataWrite::Clear => {
                self.store
                    .clear_form_data(&self.workspace_id, &self.step_key)
                    .await
            }
        }
    }

    fn name(&self) -> &str {
        "form-data"
    }
}

// ============================================================================
// Bridge
// ============================================================================

pub struct PersistenceBridge {
    workspace_id: String,
    step_key: String,
    snapshots: Arc<dyn SnapshotStore>,
    form_data: Arc<dyn FormDataStore>,
    snapshot_writer: Debouncer<SnapshotWrite>,
    form_writer: Debouncer<FormDataWrite>,
    last_emitted: Mutex<Option<SnapshotWrite>>,
}

impl PersistenceBridge {
    pub fn new(
        workspace_id: impl Into<String>,
        step_key: impl Into<String>,
        snapshots: Arc<dyn SnapshotStore>,
        form_data: Arc<dyn FormDataStore>,
        snapshot_debounce: Duration,
        form_data_debounce: Duration,
    ) -> Self {
        let workspace_id = workspace_id.into();
        let step_key = step_key.into();
        let snapshot_writer = Debouncer::new(
            snapshot_debounce,
            Arc::new(SnapshotSink {
                store: Arc::clone(&snapshots),
                workspace_id: workspace_id.clone(),
                step_key: step_key.clone(),
            }),
        );
        let form_writer = Debouncer::new(
            form_data_debounce,
            Arc::new(FormDataSink {
                store: Arc::clone(&form_data),
                workspace_id: workspace_id.clone(),
                step_key: step_key.clone(),
            }),
        );
        Self {
            workspace_id,
            step_key,
            snapshots,
            form_data,
            snapshot_writer,
            form_writer,
            last_emitted: Mutex::new(None),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn step_key(&self) -> &str {
        &self.step_key
    }

    /// Schedule `write` unless it equals the last write emitted.
    ///
    /// Returns whether a write was scheduled.
    pub async fn observe(&self, write: SnapshotWrite) -> bool {
        {
            let mut last = self.last_emitted.lock().await;
            if last.as_ref() == Some(&write) {
                return false;
            }
            *last = Some(write.clone());
        }
        self.snapshot_writer.schedule(write).await;
        true
    }

    /// Write `write` synchronously, superseding anything pending.
    pub async fn persist_now(&self, write: SnapshotWrite) -> AppResult<()> {
        self.snapshot_writer.cancel().await;
        *self.last_emitted.lock().await = Some(write.clone());
        match write {
            SnapshotWrite::Put(snapshot) => {
                self.snapshots
                    .save_snapshot(&self.workspace_id, &self.step_key, &snapshot)
                    .await
            }
            SnapshotWrite::Clear => {
                self.snapshots
                    .clear_snapshot(&self.workspace_id, &self.step_key)
                    .await
            }
        }
    }

    /// Record a snapshot that arrived from elsewhere so it is not echoed back.
    pub async fn note_external(&self, snapshot: PersistedUiState) {
        self.snapshot_writer.cancel().await;
        *self.last_emitted.lock().await = Some(SnapshotWrite::Put(snapshot));
    }

    /// Read the persisted snapshot once per mount.
    pub async fn load(&self) -> AppResult<Option<PersistedUiState>> {
        let snapshot = self
            .snapshots
            .load_snapshot(&self.workspace_id, &self.step_key)
            .await?;
        *self.last_emitted.lock().await = Some(match &snapshot {
            Some(snapshot) => SnapshotWrite::Put(snapshot.clone()),
            None => SnapshotWrite::Clear,
        });
        Ok(snapshot)
    }

    /// Read the form-data cache.
    pub async fn load_form_data(&self) -> AppResult<Option<StepData>> {
        self.form_data
            .load_form_data(&self.workspace_id, &self.step_key)
            .await
    }

    /// Schedule a debounced form-data write.
    pub async fn schedule_form_data(&self, data: StepData) {
        self.form_writer.schedule(FormDataWrite::Put(data)).await;
    }

    /// Drop pending form data and clear the cache now.
    pub async fn clear_form_data(&self) -> AppResult<()> {
        self.form_writer.cancel().await;
        self.form_data
            .clear_form_data(&self.workspace_id, &self.step_key)
            .await
    }

    /// Drain both debounced writers.
    pub async fn flush(&self) -> AppResult<()> {
        let (snapshot, form) =
            futures_util::future::join(self.snapshot_writer.flush(), self.form_writer.flush())
                .await;
        snapshot?;
        form
    }
}

impl std::fmt::Debug for PersistenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceBridge")
            .field("workspace_id", &self.workspace_id)
            .field("step_key", &self.step_key)
            .finish()
    }
}
