//! SQLite Database
//!
//! Sessions, UI snapshots and the form-data cache share one SQLite file,
//! accessed through an r2d2 pool.

use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{database_path, ensure_dir};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Idempotent schema, applied every time a database is opened
const SCHEMA: &[&str] = &[
    // Session records as JSON documents
    "CREATE TABLE IF NOT EXISTS wizard_sessions (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        wizard TEXT NOT NULL,
        record TEXT NOT NULL,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE INDEX IF NOT EXISTS idx_wizard_sessions_workspace
     ON wizard_sessions(workspace_id, wizard)",
    // One UI snapshot per (workspace, step)
    "CREATE TABLE IF NOT EXISTS ui_snapshots (
        workspace_id TEXT NOT NULL,
        step_key TEXT NOT NULL,
        snapshot TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (workspace_id, step_key)
    )",
    // Debounced form data per (workspace, step)
    "CREATE TABLE IF NOT EXISTS form_data (
        workspace_id TEXT NOT NULL,
        step_key TEXT NOT NULL,
        data TEXT NOT NULL,
        updated_at TEXT DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (workspace_id, step_key)
    )",
];

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// In-memory database for tests.
    ///
    /// Every `:memory:` connection is its own database, so the pool is capped
    /// at one connection.
    pub fn new_in_memory() -> AppResult<Self> {
        Self::with_manager(SqliteConnectionManager::memory(), 1)
    }

    /// Open the default database at ~/.wizard-flow/wizard.db
    pub fn new() -> AppResult<Self> {
        Self::open(&database_path()?)
    }

    /// Open (or create) a database file
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            ensure_dir(parent)?;
        }
        let db = Self::with_manager(SqliteConnectionManager::file(db_path), 4)?;
        tracing::debug!("[Database] Opened {}", db_path.display());
        Ok(db)
    }

    fn with_manager(manager: SqliteConnectionManager, max_size: u32) -> AppResult<Self> {
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;
        let db = Self { pool };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> AppResult<()> {
        let conn = self.connection()?;
        for statement in SCHEMA {
            conn.execute(statement, [])?;
        }
        Ok(())
    }

    pub fn connection(&self) -> AppResult<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("max_size", &self.pool.max_size())
            .finish()
    }
}
