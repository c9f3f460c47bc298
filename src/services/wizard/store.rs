//! Wizard State Persistence
//!
//! SQLite-backed implementation of the snapshot, form-data and session
//! stores. Values are stored as JSON documents keyed by workspace and step.

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use wizard_flow_core::{PersistedUiState, StepData, StepPayload};

use super::collaborators::{FormDataStore, SessionStore, SnapshotStore, StepSubmitter, SubmitResponse};
use crate::models::session::WizardSession;
use crate::storage::database::{Database, DbPool};
use crate::utils::error::{AppError, AppResult};

/// Manages wizard persistence in SQLite
#[derive(Clone)]
pub struct WizardStateManager {
    pool: DbPool,
}

impl WizardStateManager {
    /// Create a new state manager with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn from_database(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    fn load_document(
        &self,
        table: &str,
        column: &str,
        workspace_id: &str,
        step_key: &str,
    ) -> AppResult<Option<String>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE workspace_id = ?1 AND step_key = ?2",
            column, table
        );
        let raw = conn
            .query_row(&sql, params![workspace_id, step_key], |row| row.get(0))
            .optional()?;
        Ok(raw)
    }

    fn save_document(
        &self,
        table: &str,
        column: &str,
        workspace_id: &str,
        step_key: &str,
        json: &str,
    ) -> AppResult<()> {
        let conn = self.conn()?;
        let sql = format!(
            "INSERT INTO {table} (workspace_id, step_key, {column}, updated_at)
             VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
             ON CONFLICT(workspace_id, step_key)
             DO UPDATE SET {column} = ?3, updated_at = CURRENT_TIMESTAMP"
        );
        conn.execute(&sql, params![workspace_id, step_key, json])?;
        Ok(())
    }

    fn delete_document(&self, table: &str, workspace_id: &str, step_key: &str) -> AppResult<()> {
        let conn = self.conn()?;
        let sql = format!(
            "DELETE FROM {} WHERE workspace_id = ?1 AND step_key = ?2",
            table
        );
        conn.execute(&sql, params![workspace_id, step_key])?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for WizardStateManager {
    async fn load_snapshot(
        &self,
        workspace_id: &str,
        step_key: &str,
    ) -> AppResult<Option<PersistedUiState>> {
        match self.load_document("ui_snapshots", "snapshot", workspace_id, step_key)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(e) => {
                    // A corrupt snapshot only costs the resume position.
                    tracing::warn!(
                        "[WizardStore] Ignoring unreadable snapshot for {}/{}: {}",
                        workspace_id,
                        step_key,
                        e
                    );
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save_snapshot(
        &self,
        workspace_id: &str,
        step_key: &str,
        snapshot: &PersistedUiState,
    ) -> AppResult<()> {
        let json = serde_json::to_string(snapshot)?;
        self.save_document("ui_snapshots", "snapshot", workspace_id, step_key, &json)
    }

    async fn clear_snapshot(&self, workspace_id: &str, step_key: &str) -> AppResult<()> {
        self.delete_document("ui_snapshots", workspace_id, step_key)
    }
}

#[async_trait]
impl FormDataStore for WizardStateManager {
    async fn load_form_data(
        &self,
        workspace_id: &str,
        step_key: &str,
    ) -> AppResult<Option<StepData>> {
        match self.load_document("form_data", "data", workspace_id, step_key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_form_data(
        &self,
        workspace_id: &str,
        step_key: &str,
        data: &StepData,
    ) -> AppResult<()> {
        let json = serde_json::to_string(data)?;
        self.save_document("form_data", "data", workspace_id, step_key, &json)
    }

    async fn clear_form_data(&self, workspace_id: &str, step_key: &str) -> AppResult<()> {
        self.delete_document("form_data", workspace_id, step_key)
    }
}

#[async_trait]
impl SessionStore for WizardStateManager {
    async fn load_session(&self, session_id: &str) -> AppResult<Option<WizardSession>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT record FROM wizard_sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn save_session(&self, session: &WizardSession) -> AppResult<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(session)?;
        conn.execute(
            "INSERT INTO wizard_sessions (id, workspace_id, wizard, record, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET record = ?4, updated_at = ?6",
            params![
                session.id,
                session.workspace_id,
                session.wizard,
                json,
                session.created_at,
                session.updated_at,
            ],
        )?;
        Ok(())
    }

    async fn latest_session(
        &self,
        workspace_id: &str,
        wizard: &str,
    ) -> AppResult<Option<WizardSession>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT record FROM wizard_sessions
                 WHERE workspace_id = ?1 AND wizard = ?2
                 ORDER BY updated_at DESC, rowid DESC LIMIT 1",
                params![workspace_id, wizard],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

// ============================================================================
// Local submission
// ============================================================================

/// Completes steps directly against the session store.
///
/// Stands in for a remote backend: the payload becomes the step's data and
/// result, and the session moves on to its next open step.
pub struct LocalStepSubmitter {
    sessions: Arc<dyn SessionStore>,
}

impl LocalStepSubmitter {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl StepSubmitter for LocalStepSubmitter {
    async fn submit_step(
        &self,
        session_id: &str,
        payload: &StepPayload,
    ) -> AppResult<SubmitResponse> {
        let mut session = self
            .sessions
            .load_session(session_id)
            .await?
            .ok_or_else(|| AppError::submission(format!("Unknown session {}", session_id)))?;

        let data = StepData {
            values: payload.values.clone(),
            items: payload.items.clone(),
        };
        if !session.set_step_data(&payload.step, data) {
            return Err(AppError::submission(format!(
                "Session {} has no step '{}'",
                session_id, payload.step
            )));
        }

        let mut suggestions = Vec::new();
        if !payload.skipped.is_empty() {
            suggestions.push(format!(
                "{} optional question(s) were skipped and can be filled in later",
                payload.skipped.len()
            ));
        }

        let result = serde_json::to_value(payload)?;
        session.complete_step(&payload.step, Some(result), suggestions.clone());
        self.sessions.save_session(&session).await?;
        tracing::info!(
            "[LocalSubmitter] Completed step '{}' of session {}",
            payload.step,
            session_id
        );

        Ok(SubmitResponse {
            updated_record: Some(session),
            suggestions,
        })
    }
}

impl std::fmt::Debug for WizardStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardStateManager").finish()
    }
}
