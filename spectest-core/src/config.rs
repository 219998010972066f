//! Policy configuration
//!
//! A policy controls ID prefixes, fingerprint normalization, coverage rules,
//! impact risk thresholds and priority keywords. Every key is optional in the
//! YAML file; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpecTestError};
use crate::models::{Priority, TestType};

/// Environment variable naming an explicit policy file
pub const POLICY_ENV_VAR: &str = "SPECTEST_POLICY";

/// Policy file looked up in the current directory
pub const LOCAL_POLICY_FILE: &str = "spectest.yaml";

/// Characters removed from the end of a statement before fingerprinting
pub const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// How statements are normalized before hashing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Number of characters of normalized text that take part in the hash
    pub window: usize,
    /// Collapse internal runs of whitespace into a single space
    pub collapse_whitespace: bool,
    /// Remove trailing punctuation before windowing
    pub strip_trailing_punctuation: bool,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            window: 50,
            collapse_whitespace: true,
            strip_trailing_punctuation: true,
        }
    }
}

/// Verification rules applied by the coverage analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoveragePolicy {
    /// Test types every covered requirement of a given priority must have
    pub required_test_types: BTreeMap<Priority, Vec<TestType>>,
}

impl Default for CoveragePolicy {
    fn default() -> Self {
        let mut required_test_types = BTreeMap::new();
        required_test_types.insert(Priority::HIGHEST, vec![TestType::E2e]);
        Self {
            required_test_types,
        }
    }
}

impl CoveragePolicy {
    /// Required test types for a priority, empty if none are configured
    pub fn required_for(&self, priority: Priority) -> &[TestType] {
        self.required_test_types
            .get(&priority)
            .map(|types| types.as_slice())
            .unwrap_or(&[])
    }
}

/// Thresholds used to score the risk of a change set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImpactPolicy {
    /// Number of removals at which risk becomes critical
    pub critical_removals: usize,
    /// Number of additions (with no removals) at which risk becomes medium
    pub medium_additions: usize,
    /// Pair removals with similar additions into `modified` changes when set
    pub modified_similarity: Option<f64>,
}

impl Default for ImpactPolicy {
    fn default() -> Self {
        Self {
            critical_removals: 3,
            medium_additions: 1,
            modified_similarity: None,
        }
    }
}

/// Keyword heuristics for assigning requirement priority
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PriorityPolicy {
    pub p0_keywords: Vec<String>,
    pub p2_keywords: Vec<String>,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| w.to_string()).collect();
        Self {
            p0_keywords: words(&["must", "shall", "critical", "security", "required"]),
            p2_keywords: words(&["should", "could", "may", "optional", "nice to have"]),
        }
    }
}

impl PriorityPolicy {
    /// Classify a statement: P0 keywords win over P2 keywords, otherwise P1
    pub fn classify(&self, statement: &str) -> Priority {
        let words = tokenize(statement);
        let lowered = statement.to_lowercase();
        let matches = |keyword: &String| {
            let keyword = keyword.to_lowercase();
            if keyword.contains(' ') {
                lowered.contains(&keyword)
            } else {
                words.iter().any(|w| *w == keyword)
            }
        };

        if self.p0_keywords.iter().any(matches) {
            Priority::P0
        } else if self.p2_keywords.iter().any(matches) {
            Priority::P2
        } else {
            Priority::P1
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Complete policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Prefix for requirement IDs (e.g., "REQ" -> "REQ-0001")
    pub req_prefix: String,
    /// Prefix for test IDs (e.g., "TEST" -> "TEST-0001")
    pub test_prefix: String,
    pub fingerprint: FingerprintConfig,
    pub coverage: CoveragePolicy,
    pub impact: ImpactPolicy,
    pub priority: PriorityPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            req_prefix: "REQ".to_string(),
            test_prefix: "TEST".to_string(),
            fingerprint: FingerprintConfig::default(),
            coverage: CoveragePolicy::default(),
            impact: ImpactPolicy::default(),
            priority: PriorityPolicy::default(),
        }
    }
}

impl PolicyConfig {
    /// Loads and validates a policy from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SpecTestError::InputNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let policy: PolicyConfig = serde_yaml::from_str(&content).map_err(|e| {
            SpecTestError::InvalidPolicy(format!("failed to parse {}: {}", path.display(), e))
        })?;
        policy.validate()?;
        Ok(policy)
    }

    /// Saves the policy to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| SpecTestError::Serialize(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, content)?;
        Ok(())
    }

    /// Locates and loads the policy to use
    ///
    /// Lookup order: explicit path, `SPECTEST_POLICY`, `./spectest.yaml`,
    /// `<config dir>/spectest/policy.yaml`. Falls back to defaults when no
    /// file is found. Returns the policy together with the file it came from.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var(POLICY_ENV_VAR) {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let local = PathBuf::from(LOCAL_POLICY_FILE);
        if local.exists() {
            return Ok((Self::load(&local)?, Some(local)));
        }

        if let Some(global) = global_policy_path() {
            if global.exists() {
                return Ok((Self::load(&global)?, Some(global)));
            }
        }

        log::debug!("No policy file found, using defaults");
        Ok((Self::default(), None))
    }

    /// Checks the policy for values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (key, prefix) in [("req_prefix", &self.req_prefix), ("test_prefix", &self.test_prefix)] {
            if prefix.is_empty() {
                problems.push(format!("{} must not be empty", key));
            } else if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                problems.push(format!(
                    "{} '{}' may only contain ASCII letters, digits and '_'",
                    key, prefix
                ));
            }
        }

        if self.req_prefix == self.test_prefix && !self.req_prefix.is_empty() {
            problems.push("req_prefix and test_prefix must differ".to_string());
        }

        if self.fingerprint.window == 0 {
            problems.push("fingerprint.window must be greater than zero".to_string());
        }

        if self.impact.critical_removals == 0 {
            problems.push("impact.critical_removals must be greater than zero".to_string());
        }
        if self.impact.medium_additions == 0 {
            problems.push("impact.medium_additions must be greater than zero".to_string());
        }
        if let Some(threshold) = self.impact.modified_similarity {
            if !(threshold > 0.0 && threshold <= 1.0) {
                problems.push(format!(
                    "impact.modified_similarity must be in (0, 1], got {}",
                    threshold
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SpecTestError::InvalidPolicy(problems.join("; ")))
        }
    }
}

/// Gets the path of the per-user policy file
pub fn global_policy_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spectest").join("policy.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = PolicyConfig::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.req_prefix, "REQ");
        assert_eq!(policy.test_prefix, "TEST");
        assert_eq!(policy.fingerprint.window, 50);
        assert_eq!(policy.coverage.required_for(Priority::P0), &[TestType::E2e]);
        assert!(policy.coverage.required_for(Priority::P2).is_empty());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("policy.yaml");
        fs::write(&path, "req_prefix: SPEC\nfingerprint:\n  window: 80\n").unwrap();

        let policy = PolicyConfig::load(&path).unwrap();
        assert_eq!(policy.req_prefix, "SPEC");
        assert_eq!(policy.test_prefix, "TEST");
        assert_eq!(policy.fingerprint.window, 80);
        assert!(policy.fingerprint.strip_trailing_punctuation);
        assert_eq!(policy.impact.critical_removals, 3);
    }

    #[test]
    fn test_required_test_types_from_yaml() {
        let yaml = "coverage:\n  required_test_types:\n    P0: [e2e, security]\n    P1: [integration]\n";
        let policy: PolicyConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            policy.coverage.required_for(Priority::P0),
            &[TestType::E2e, TestType::Security]
        );
        assert_eq!(policy.coverage.required_for(Priority::P1), &[TestType::Integration]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut policy = PolicyConfig::default();
        policy.req_prefix = "REQ ID".to_string();
        policy.fingerprint.window = 0;
        policy.impact.modified_similarity = Some(1.5);

        let err = policy.validate().unwrap_err().to_string();
        assert!(err.contains("req_prefix"));
        assert!(err.contains("fingerprint.window"));
        assert!(err.contains("modified_similarity"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = PolicyConfig::load(temp_dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(SpecTestError::InputNotFound(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("policy.yaml");

        let mut policy = PolicyConfig::default();
        policy.test_prefix = "TC".to_string();
        policy.impact.modified_similarity = Some(0.6);
        policy.save(&path).unwrap();

        let loaded = PolicyConfig::load(&path).unwrap();
        assert_eq!(loaded, policy);
    }

    #[test]
    fn test_discover_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.yaml");
        fs::write(&path, "test_prefix: TC\n").unwrap();

        let (policy, source) = PolicyConfig::discover(Some(&path)).unwrap();
        assert_eq!(policy.test_prefix, "TC");
        assert_eq!(source.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_priority_classification() {
        let policy = PriorityPolicy::default();
        assert_eq!(policy.classify("The system must encrypt data"), Priority::P0);
        assert_eq!(policy.classify("Users should see a dashboard"), Priority::P2);
        assert_eq!(policy.classify("Dark mode is nice to have"), Priority::P2);
        assert_eq!(policy.classify("Users can log out"), Priority::P1);
        // Whole words only: "mustard" is not "must"
        assert_eq!(policy.classify("Show the mustard icon"), Priority::P1);
    }
}
