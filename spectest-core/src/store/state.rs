//! In-memory identifier store state
//!
//! One `CategoryState` per ID category holds the fingerprint -> ID mapping
//! and the next sequence number. `BTreeMap` keeps the serialized file sorted
//! so diffs between runs stay small.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use crate::error::{Result, SpecTestError};

/// Current on-disk format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Kind of identifier being allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdCategory {
    Requirement,
    Test,
}

impl IdCategory {
    pub fn all() -> &'static [IdCategory] {
        &[IdCategory::Requirement, IdCategory::Test]
    }

    /// Key used for this category in storage backends
    pub fn key(&self) -> &'static str {
        match self {
            IdCategory::Requirement => "requirement",
            IdCategory::Test => "test",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "requirement" => Some(IdCategory::Requirement),
            "test" => Some(IdCategory::Test),
            _ => None,
        }
    }
}

impl fmt::Display for IdCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn default_next_id() -> u64 {
    1
}

fn default_version() -> u32 {
    STORE_FORMAT_VERSION
}

/// Mapping and counter for one category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryState {
    #[serde(default = "default_next_id")]
    pub next_id: u64,
    /// Fingerprint -> issued ID
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

impl Default for CategoryState {
    fn default() -> Self {
        Self {
            next_id: 1,
            mappings: BTreeMap::new(),
        }
    }
}

/// Complete identifier store contents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub requirements: CategoryState,
    #[serde(default)]
    pub tests: CategoryState,
}

impl Default for IdState {
    fn default() -> Self {
        Self::new()
    }
}

impl IdState {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            version: STORE_FORMAT_VERSION,
            requirements: CategoryState::default(),
            tests: CategoryState::default(),
        }
    }

    pub fn category(&self, category: IdCategory) -> &CategoryState {
        match category {
            IdCategory::Requirement => &self.requirements,
            IdCategory::Test => &self.tests,
        }
    }

    pub fn category_mut(&mut self, category: IdCategory) -> &mut CategoryState {
        match category {
            IdCategory::Requirement => &mut self.requirements,
            IdCategory::Test => &mut self.tests,
        }
    }

    /// Gets the ID already issued for a fingerprint, if any
    pub fn lookup(&self, category: IdCategory, fingerprint: &str) -> Option<&str> {
        self.category(category)
            .mappings
            .get(fingerprint)
            .map(|id| id.as_str())
    }

    /// Get or issue the ID for a fingerprint
    pub fn issue(&mut self, category: IdCategory, fingerprint: &str, prefix: &str) -> String {
        let state = self.category_mut(category);
        if let Some(id) = state.mappings.get(fingerprint) {
            return id.clone();
        }

        let id = format_id(prefix, state.next_id);
        state.mappings.insert(fingerprint.to_string(), id.clone());
        state.next_id += 1;
        id
    }

    /// Number of IDs issued in a category
    pub fn issued(&self, category: IdCategory) -> usize {
        self.category(category).mappings.len()
    }

    /// Reverse lookup: fingerprint for an issued ID
    pub fn fingerprint_of(&self, category: IdCategory, id: &str) -> Option<&str> {
        self.category(category)
            .mappings
            .iter()
            .find(|(_, issued)| issued.as_str() == id)
            .map(|(fp, _)| fp.as_str())
    }

    /// Checks the store invariants; `path` is only used for error reporting
    ///
    /// Within a category no ID may be issued twice, every ID must end in a
    /// sequence number, and the counter must be beyond every issued number.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if self.version > STORE_FORMAT_VERSION {
            return Err(SpecTestError::corrupt(
                path,
                format!(
                    "format version {} is newer than supported version {}",
                    self.version, STORE_FORMAT_VERSION
                ),
            ));
        }

        for &category in IdCategory::all() {
            let state = self.category(category);
            if state.next_id == 0 {
                return Err(SpecTestError::corrupt(
                    path,
                    format!("{} counter must start at 1", category),
                ));
            }

            let mut seen = HashSet::new();
            for (fingerprint, id) in &state.mappings {
                if !seen.insert(id.as_str()) {
                    return Err(SpecTestError::corrupt(
                        path,
                        format!("{} ID {} is mapped more than once", category, id),
                    ));
                }

                let number = sequence_number(id).ok_or_else(|| {
                    SpecTestError::corrupt(
                        path,
                        format!("{} ID '{}' for {} has no sequence number", category, id, fingerprint),
                    )
                })?;

                if number >= state.next_id {
                    return Err(SpecTestError::corrupt(
                        path,
                        format!(
                            "{} counter {} is not beyond issued ID {}",
                            category, state.next_id, id
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Formats an ID as `<prefix>-NNNN`; numbers past 9999 widen instead of wrapping
pub fn format_id(prefix: &str, number: u64) -> String {
    format!("{}-{:04}", prefix, number)
}

/// Extracts the trailing sequence number of an ID such as "REQ-0042"
pub fn sequence_number(id: &str) -> Option<u64> {
    let (_, digits) = id.rsplit_once('-')?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
