use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{Result, SpecTestError};
use crate::store::IdState;

/// How long to wait for another process to release the store lock
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles saving and loading the identifier store YAML file, with an
/// advisory lock on a sidecar `.lock` file around every read and write
pub struct Storage {
    file_path: PathBuf,
    lock_file_path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        let mut lock_name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_file_path = file_path.with_file_name(lock_name);
        Self {
            file_path,
            lock_file_path,
        }
    }

    /// Returns the path to the storage file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Returns the path to the sidecar lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_file_path
    }

    /// Acquire an exclusive lock for writing
    /// Returns the lock file handle which must be held during the operation
    fn acquire_write_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.lock_file_path)?;

        self.wait_for_lock(|| FileExt::try_lock_exclusive(&lock_file))?;

        // Lock holder info, for debugging stuck locks
        let _ = writeln!(
            lock_file,
            "Locked by PID {} at {}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );

        Ok(lock_file)
    }

    /// Acquire a shared lock for reading
    fn acquire_read_lock(&self) -> Result<Option<File>> {
        if !self.lock_file_path.exists() {
            return Ok(None);
        }

        let lock_file = OpenOptions::new().read(true).open(&self.lock_file_path)?;
        self.wait_for_lock(|| FileExt::try_lock_shared(&lock_file))?;
        Ok(Some(lock_file))
    }

    fn wait_for_lock<F>(&self, mut try_lock: F) -> Result<()>
    where
        F: FnMut() -> std::io::Result<()>,
    {
        let start = Instant::now();

        loop {
            match try_lock() {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if start.elapsed() > LOCK_TIMEOUT {
                        return Err(SpecTestError::StoreLocked(self.file_path.clone()));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Loads the store under a shared lock; a missing file is an empty store
    pub fn load(&self) -> Result<IdState> {
        if !self.file_path.exists() {
            return Ok(IdState::new());
        }

        let _lock = self.acquire_read_lock()?;
        self.read_unlocked()
    }

    /// Saves the store under an exclusive lock
    pub fn save(&self, state: &IdState) -> Result<()> {
        let _lock = self.acquire_write_lock()?;
        self.write_unlocked(state)
    }

    /// Perform an atomic update operation with proper locking
    /// This reloads the file, applies changes, and saves while holding the lock
    pub fn update_atomically(&self, update_fn: &mut dyn FnMut(&mut IdState)) -> Result<IdState> {
        let _lock = self.acquire_write_lock()?;

        let mut state = if self.file_path.exists() {
            self.read_unlocked()?
        } else {
            IdState::new()
        };

        update_fn(&mut state);
        state.validate(&self.file_path)?;
        self.write_unlocked(&state)?;

        Ok(state)
    }

    fn read_unlocked(&self) -> Result<IdState> {
        let file = File::open(&self.file_path)?;
        let reader = BufReader::new(file);

        let state: IdState = serde_yaml::from_reader(reader)
            .map_err(|e| SpecTestError::corrupt(&self.file_path, e.to_string()))?;
        state.validate(&self.file_path)?;

        Ok(state)
    }

    /// Writes to a temporary sibling and renames it over the store, so a
    /// crash mid-write never leaves a truncated file behind
    fn write_unlocked(&self, state: &IdState) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml =
            serde_yaml::to_string(state).map_err(|e| SpecTestError::Serialize(e.to_string()))?;

        let tmp_path = self.file_path.with_extension("tmp");
        fs::write(&tmp_path, yaml)?;
        fs::rename(&tmp_path, &self.file_path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::IdCategory;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_is_sidecar() {
        let storage = Storage::new("/tmp/work/.spectest-ids.yaml");
        assert_eq!(
            storage.lock_path(),
            Path::new("/tmp/work/.spectest-ids.yaml.lock")
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("ids.yaml"));

        let state = storage.load().unwrap();
        assert_eq!(state.issued(IdCategory::Requirement), 0);
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_update_atomically_persists() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("nested").join("ids.yaml"));

        storage
            .update_atomically(&mut |state| {
                state.issue(IdCategory::Requirement, "abc", "REQ");
            })
            .unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.lookup(IdCategory::Requirement, "abc"), Some("REQ-0001"));
    }

    #[test]
    fn test_garbage_file_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ids.yaml");
        fs::write(&path, "requirements: [this is: not a store").unwrap();

        let storage = Storage::new(&path);
        let result = storage.load();
        assert!(matches!(result, Err(SpecTestError::StoreCorrupt { .. })));

        // The corrupt file must be left untouched
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("requirements: [this"));
    }

    #[test]
    fn test_held_lock_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("ids.yaml"));

        let _held = storage.acquire_write_lock().unwrap();

        // A second handle on the same lock file cannot take the exclusive lock
        let other = Storage::new(temp_dir.path().join("ids.yaml"));
        let result = other.save(&IdState::new());
        assert!(matches!(result, Err(SpecTestError::StoreLocked(_))));
    }

    #[test]
    fn test_held_read_lock_blocks_writer() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::new(temp_dir.path().join("ids.yaml"));
        storage.save(&IdState::new()).unwrap();

        let _reader = storage.acquire_read_lock().unwrap().unwrap();

        // Shared locks coexist, exclusive ones wait
        let other = Storage::new(temp_dir.path().join("ids.yaml"));
        assert!(other.load().is_ok());
        assert!(matches!(
            other.save(&IdState::new()),
            Err(SpecTestError::StoreLocked(_))
        ));
    }
}
