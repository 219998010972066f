//! SQLite identifier store backend
//!
//! Stores mappings and counters in two tables. Allocation runs inside an
//! immediate transaction, so concurrent processes serialize on the database
//! write lock instead of overwriting each other.

use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::state::{IdCategory, IdState};
use super::traits::{BackendType, IdStoreBackend};
use crate::error::{Result, SpecTestError};

/// Current schema version
const SCHEMA_VERSION: i64 = 1;

/// How long a writer waits for another process's transaction
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (creating if needed) a SQLite identifier store
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| self.map_err(e))?;

        let has_schema: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(|e| self.map_err(e))?
            > 0;

        if !has_schema {
            conn.execute_batch(include_str!("schema.sql"))?;
            return Ok(());
        }

        let version: i64 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .map_err(|e| SpecTestError::corrupt(&self.path, format!("no schema version: {}", e)))?;

        if version != SCHEMA_VERSION {
            return Err(SpecTestError::corrupt(
                &self.path,
                format!("schema version {} is not supported (expected {})", version, SCHEMA_VERSION),
            ));
        }

        Ok(())
    }

    /// Maps "not a database" and lock timeouts to the store error taxonomy
    fn map_err(&self, err: rusqlite::Error) -> SpecTestError {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::NotADatabase => {
                SpecTestError::corrupt(&self.path, err.to_string())
            }
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked =>
            {
                SpecTestError::StoreLocked(self.path.clone())
            }
            _ => SpecTestError::Sqlite(err),
        }
    }

    fn read_state(&self, conn: &Connection) -> Result<IdState> {
        let mut state = IdState::new();

        let mut stmt = conn.prepare("SELECT category, next_id FROM id_counters")?;
        let counters = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for counter in counters {
            let (key, next_id) = counter?;
            let category = self.category(&key)?;
            state.category_mut(category).next_id = u64::try_from(next_id).map_err(|_| {
                SpecTestError::corrupt(&self.path, format!("negative counter for {}", key))
            })?;
        }

        let mut stmt = conn.prepare("SELECT category, fingerprint, issued_id FROM id_mappings")?;
        let mappings = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        for mapping in mappings {
            let (key, fingerprint, issued_id) = mapping?;
            let category = self.category(&key)?;
            state
                .category_mut(category)
                .mappings
                .insert(fingerprint, issued_id);
        }

        state.validate(&self.path)?;
        Ok(state)
    }

    fn write_state(conn: &Connection, state: &IdState) -> Result<()> {
        conn.execute("DELETE FROM id_mappings", [])?;
        conn.execute("DELETE FROM id_counters", [])?;

        for &category in IdCategory::all() {
            let cat_state = state.category(category);
            conn.execute(
                "INSERT INTO id_counters (category, next_id) VALUES (?1, ?2)",
                params![category.key(), cat_state.next_id as i64],
            )?;

            let mut stmt = conn.prepare(
                "INSERT INTO id_mappings (category, fingerprint, issued_id) VALUES (?1, ?2, ?3)",
            )?;
            for (fingerprint, issued_id) in &cat_state.mappings {
                stmt.execute(params![category.key(), fingerprint, issued_id])?;
            }
        }

        Ok(())
    }

    fn category(&self, key: &str) -> Result<IdCategory> {
        IdCategory::from_key(key).ok_or_else(|| {
            SpecTestError::corrupt(&self.path, format!("unknown ID category '{}'", key))
        })
    }
}

impl IdStoreBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<IdState> {
        let conn = self.lock();
        self.read_state(&conn)
    }

    fn save(&self, state: &IdState) -> Result<()> {
        state.validate(&self.path)?;

        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.map_err(e))?;
        Self::write_state(&tx, state)?;
        tx.commit().map_err(|e| self.map_err(e))?;
        Ok(())
    }

    fn update_atomically(&self, update_fn: &mut dyn FnMut(&mut IdState)) -> Result<IdState> {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.map_err(e))?;

        let mut state = self.read_state(&tx)?;
        update_fn(&mut state);
        state.validate(&self.path)?;

        Self::write_state(&tx, &state)?;
        tx.commit().map_err(|e| self.map_err(e))?;

        Ok(state)
    }
}
