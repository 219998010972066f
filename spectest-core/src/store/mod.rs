//! Identifier store abstraction
//!
//! This module provides a trait-based abstraction for identifier store
//! backends, so the fingerprint -> ID mapping can live in a YAML file or a
//! SQLite database without touching allocation logic.

mod migration;
mod sqlite_backend;
mod state;
mod traits;
mod yaml_backend;

pub use migration::{migrate_sqlite_to_yaml, migrate_store, migrate_yaml_to_sqlite};
pub use sqlite_backend::SqliteBackend;
pub use state::{
    format_id, sequence_number, CategoryState, IdCategory, IdState, STORE_FORMAT_VERSION,
};
pub use traits::{BackendType, IdStoreBackend, StoreStats};
pub use yaml_backend::YamlBackend;

use std::path::{Path, PathBuf};

use crate::error::Result;

/// File name of the YAML identifier store inside a working directory
pub const YAML_STORE_FILE: &str = ".spectest-ids.yaml";

/// File name of the SQLite identifier store inside a working directory
pub const SQLITE_STORE_FILE: &str = ".spectest-ids.db";

/// Creates a backend based on the file extension or explicit type
pub fn create_backend(
    path: &Path,
    backend_type: Option<BackendType>,
) -> Result<Box<dyn IdStoreBackend>> {
    let bt = backend_type.unwrap_or_else(|| BackendType::from_path(path));

    match bt {
        BackendType::Yaml => Ok(Box::new(YamlBackend::new(path))),
        BackendType::Sqlite => Ok(Box::new(SqliteBackend::new(path)?)),
    }
}

/// Path of the store a working directory uses
///
/// An existing SQLite store takes precedence; otherwise the YAML store is used.
pub fn store_path_in(work_dir: &Path) -> PathBuf {
    let sqlite = work_dir.join(SQLITE_STORE_FILE);
    if sqlite.exists() {
        sqlite
    } else {
        work_dir.join(YAML_STORE_FILE)
    }
}

/// Opens the identifier store of a working directory
pub fn open_in_dir(work_dir: &Path) -> Result<Box<dyn IdStoreBackend>> {
    create_backend(&store_path_in(work_dir), None)
}
