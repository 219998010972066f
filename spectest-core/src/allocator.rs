//! Stable, content-addressed identifier allocation
//!
//! `IdAllocator` maps statement fingerprints to short IDs such as `REQ-0001`.
//! The complete store is loaded on open and every new allocation is written
//! back before it is returned, so IDs survive regeneration of artifacts from
//! an edited document.

use std::path::Path;

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::store::{self, IdCategory, IdState, IdStoreBackend};

/// Allocates and persists requirement and test IDs
pub struct IdAllocator {
    backend: Box<dyn IdStoreBackend>,
    state: IdState,
    fingerprinter: Fingerprinter,
    req_prefix: String,
    test_prefix: String,
}

impl IdAllocator {
    /// Opens the identifier store of a working directory with the default policy
    pub fn open<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        Self::open_with_policy(work_dir, &PolicyConfig::default())
    }

    /// Opens the identifier store of a working directory
    pub fn open_with_policy<P: AsRef<Path>>(work_dir: P, policy: &PolicyConfig) -> Result<Self> {
        let backend = store::open_in_dir(work_dir.as_ref())?;
        Self::with_backend(backend, policy)
    }

    /// Wraps an explicit backend, loading its complete state
    pub fn with_backend(backend: Box<dyn IdStoreBackend>, policy: &PolicyConfig) -> Result<Self> {
        let state = backend.load()?;
        log::debug!(
            "Opened {} identifier store {} ({} requirement IDs, {} test IDs)",
            backend.backend_type(),
            backend.path().display(),
            state.issued(IdCategory::Requirement),
            state.issued(IdCategory::Test)
        );

        Ok(Self {
            backend,
            state,
            fingerprinter: Fingerprinter::new(policy.fingerprint.clone()),
            req_prefix: policy.req_prefix.clone(),
            test_prefix: policy.test_prefix.clone(),
        })
    }

    /// Overrides the ID prefixes (e.g., "SPEC" and "TC")
    pub fn with_prefixes(mut self, req_prefix: &str, test_prefix: &str) -> Self {
        self.req_prefix = req_prefix.to_string();
        self.test_prefix = test_prefix.to_string();
        self
    }

    /// Path of the underlying store
    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    pub fn state(&self) -> &IdState {
        &self.state
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Fingerprint of a statement under this allocator's normalization
    pub fn fingerprint(&self, statement: &str) -> Fingerprint {
        self.fingerprinter.fingerprint(statement)
    }

    pub fn prefix(&self, category: IdCategory) -> &str {
        match category {
            IdCategory::Requirement => &self.req_prefix,
            IdCategory::Test => &self.test_prefix,
        }
    }

    /// Returns the ID for a fingerprint, issuing and persisting a new one if needed
    ///
    /// A fingerprint that is already mapped keeps its ID even if the prefix
    /// configuration has changed since it was issued.
    pub fn allocate(&mut self, category: IdCategory, fingerprint: &Fingerprint) -> Result<String> {
        if let Some(id) = self.state.lookup(category, fingerprint.as_str()) {
            return Ok(id.to_string());
        }

        let key = fingerprint.as_str();
        let prefix = self.prefix(category).to_string();
        let mut issued = String::new();

        // Reloads under the store lock, so allocations made by another
        // process since we opened the store are kept and reused
        self.state = self.backend.update_atomically(&mut |state| {
            issued = state.issue(category, key, &prefix);
        })?;

        log::debug!("Allocated {} for {} {}", issued, category, fingerprint.short());
        Ok(issued)
    }

    /// Requirement ID for a fingerprint
    pub fn requirement_id(&mut self, fingerprint: &Fingerprint) -> Result<String> {
        self.allocate(IdCategory::Requirement, fingerprint)
    }

    /// Test ID for a fingerprint
    pub fn test_id(&mut self, fingerprint: &Fingerprint) -> Result<String> {
        self.allocate(IdCategory::Test, fingerprint)
    }

    /// Fingerprints a statement and returns its requirement ID
    pub fn requirement_id_for(&mut self, statement: &str) -> Result<String> {
        let fingerprint = self.fingerprint(statement);
        self.requirement_id(&fingerprint)
    }

    /// Existing ID for a fingerprint, without allocating
    pub fn lookup(&self, category: IdCategory, fingerprint: &Fingerprint) -> Option<&str> {
        self.state.lookup(category, fingerprint.as_str())
    }

    /// Number of IDs issued in a category
    pub fn issued(&self, category: IdCategory) -> usize {
        self.state.issued(category)
    }

    /// Writes the complete state and refreshes it from the store
    ///
    /// Allocations are already persisted as they happen; flushing also
    /// creates the store file when nothing has been allocated yet.
    pub fn flush(&mut self) -> Result<()> {
        self.state = self.backend.update_atomically(&mut |_| {})?;
        Ok(())
    }

    /// Flushes and releases the store
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}
