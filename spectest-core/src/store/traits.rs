//! Identifier store backend traits
//!
//! This module defines the trait every identifier store backend implements,
//! so allocation logic never depends on where the mapping lives.

use std::path::Path;

use super::state::{IdCategory, IdState};
use crate::error::Result;

/// Types of identifier store backends available
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// YAML file storage (single human-diffable file)
    Yaml,
    /// SQLite database storage
    Sqlite,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendType::Yaml => write!(f, "YAML"),
            BackendType::Sqlite => write!(f, "SQLite"),
        }
    }
}

impl BackendType {
    /// Infer the backend from a file extension, defaulting to YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("db") | Some("sqlite") | Some("sqlite3") => BackendType::Sqlite,
            _ => BackendType::Yaml,
        }
    }
}

/// Core trait for identifier store backends
///
/// `load()` returns the complete state; `update_atomically()` is the only
/// way the allocator mutates a store, so backends that can lock or open a
/// transaction do so there.
pub trait IdStoreBackend: Send + Sync {
    /// Returns the backend type
    fn backend_type(&self) -> BackendType;

    /// Returns the path to the store file
    fn path(&self) -> &Path;

    /// Loads the complete state; a store that does not exist yet is empty
    fn load(&self) -> Result<IdState>;

    /// Replaces the complete state
    fn save(&self, state: &IdState) -> Result<()>;

    /// Reloads the state, applies `update_fn` and saves it as one operation
    /// Default implementation has no isolation between load and save
    fn update_atomically(&self, update_fn: &mut dyn FnMut(&mut IdState)) -> Result<IdState> {
        let mut state = self.load()?;
        update_fn(&mut state);
        state.validate(self.path())?;
        self.save(&state)?;
        Ok(state)
    }

    /// Returns true if the store file exists
    fn exists(&self) -> bool {
        self.path().exists()
    }

    /// Returns statistics about the store
    fn stats(&self) -> Result<StoreStats> {
        let state = self.load()?;
        Ok(StoreStats {
            requirement_ids: state.issued(IdCategory::Requirement),
            test_ids: state.issued(IdCategory::Test),
            next_requirement: state.requirements.next_id,
            next_test: state.tests.next_id,
            backend_type: self.backend_type(),
        })
    }
}

/// Statistics about an identifier store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub requirement_ids: usize,
    pub test_ids: usize,
    pub next_requirement: u64,
    pub next_test: u64,
    pub backend_type: BackendType,
}
