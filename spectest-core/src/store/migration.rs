//! Migration utilities for moving an identifier store between backends

use std::path::Path;

use super::traits::IdStoreBackend;
use super::{SqliteBackend, YamlBackend};
use crate::error::{Result, SpecTestError};
use crate::store::IdCategory;

/// Copies the complete state of one store into another
///
/// The destination must not hold any allocations yet; merging two stores
/// could hand the same ID to two fingerprints.
///
/// # Returns
/// The number of mappings copied
pub fn migrate_store(from: &dyn IdStoreBackend, to: &dyn IdStoreBackend) -> Result<usize> {
    let state = from.load()?;

    let existing = to.load()?;
    let occupied: usize = IdCategory::all().iter().map(|&c| existing.issued(c)).sum();
    if occupied > 0 {
        return Err(SpecTestError::InvalidInput {
            path: to.path().to_path_buf(),
            reason: format!("destination already holds {} allocations", occupied),
        });
    }

    to.save(&state)?;

    let copied: usize = IdCategory::all().iter().map(|&c| state.issued(c)).sum();
    log::info!(
        "Migrated {} mappings from {} store {} to {} store {}",
        copied,
        from.backend_type(),
        from.path().display(),
        to.backend_type(),
        to.path().display()
    );
    Ok(copied)
}

/// Migrates a YAML identifier store into a SQLite database
pub fn migrate_yaml_to_sqlite<P1: AsRef<Path>, P2: AsRef<Path>>(
    yaml_path: P1,
    sqlite_path: P2,
) -> Result<usize> {
    let yaml_backend = YamlBackend::new(yaml_path);
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    migrate_store(&yaml_backend, &sqlite_backend)
}

/// Migrates a SQLite identifier store into a YAML file
pub fn migrate_sqlite_to_yaml<P1: AsRef<Path>, P2: AsRef<Path>>(
    sqlite_path: P1,
    yaml_path: P2,
) -> Result<usize> {
    let sqlite_backend = SqliteBackend::new(sqlite_path)?;
    let yaml_backend = YamlBackend::new(yaml_path);
    migrate_store(&sqlite_backend, &yaml_backend)
}
