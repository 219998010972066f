//! YAML file identifier store backend
//!
//! Stores the whole state in a single YAML file through `Storage`, which
//! takes an advisory lock around each read-modify-write.

use std::path::{Path, PathBuf};

use super::state::IdState;
use super::traits::{BackendType, IdStoreBackend};
use crate::error::Result;
use crate::storage::Storage;

/// YAML file backend implementation
pub struct YamlBackend {
    storage: Storage,
    path: PathBuf,
}

impl YamlBackend {
    /// Creates a new YAML backend for the given file path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            storage: Storage::new(&path),
            path,
        }
    }

    /// Gets a reference to the underlying Storage
    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl IdStoreBackend for YamlBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Yaml
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<IdState> {
        self.storage.load()
    }

    fn save(&self, state: &IdState) -> Result<()> {
        self.storage.save(state)
    }

    fn update_atomically(&self, update_fn: &mut dyn FnMut(&mut IdState)) -> Result<IdState> {
        self.storage.update_atomically(update_fn)
    }
}
