use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Result, SpecTestError};

/// Priority tier of a requirement or test case, highest first
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
pub enum Priority {
    P0,
    #[default]
    P1,
    P2,
}

impl Priority {
    /// The most severe tier
    pub const HIGHEST: Priority = Priority::P0;

    /// All tiers in severity order
    pub fn all() -> &'static [Priority] {
        &[Priority::P0, Priority::P1, Priority::P2]
    }

    /// Parse a priority from a string such as "p0" or "P1"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "P0" => Some(Priority::P0),
            "P1" => Some(Priority::P1),
            "P2" => Some(Priority::P2),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
        }
    }
}

/// Kind of verification a test case performs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Unit,
    Integration,
    E2e,
    Performance,
    Security,
}

impl TestType {
    pub fn all() -> &'static [TestType] {
        &[
            TestType::Unit,
            TestType::Integration,
            TestType::E2e,
            TestType::Performance,
            TestType::Security,
        ]
    }

    /// Lower-case tag used in file names, Gherkin tags and serialized records
    pub fn tag(&self) -> &'static str {
        match self {
            TestType::Unit => "unit",
            TestType::Integration => "integration",
            TestType::E2e => "e2e",
            TestType::Performance => "performance",
            TestType::Security => "security",
        }
    }

    /// Parse a test type, accepting common spellings ("end-to-end", "E2E")
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unit" => Some(TestType::Unit),
            "integration" => Some(TestType::Integration),
            "e2e" | "end-to-end" | "end_to_end" => Some(TestType::E2e),
            "performance" | "perf" => Some(TestType::Performance),
            "security" => Some(TestType::Security),
            _ => None,
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Unit => write!(f, "Unit"),
            TestType::Integration => write!(f, "Integration"),
            TestType::E2e => write!(f, "E2E"),
            TestType::Performance => write!(f, "Performance"),
            TestType::Security => write!(f, "Security"),
        }
    }
}

/// A single requirement extracted from a source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Requirement {
    /// Allocator-issued identifier (e.g., "REQ-0001")
    pub id: String,

    /// The requirement text
    pub statement: String,

    pub priority: Priority,

    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    #[serde(default)]
    pub edge_cases: Vec<String>,

    /// Feature area used to group requirements, may be empty
    #[serde(default)]
    pub feature_area: String,
}

impl Requirement {
    /// Creates a requirement with no criteria, edge cases or feature area
    pub fn new(id: impl Into<String>, statement: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            statement: statement.into(),
            priority,
            acceptance_criteria: Vec::new(),
            edge_cases: Vec::new(),
            feature_area: String::new(),
        }
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn with_edge_cases(mut self, edge_cases: Vec<String>) -> Self {
        self.edge_cases = edge_cases;
        self
    }

    pub fn with_feature_area(mut self, feature_area: impl Into<String>) -> Self {
        self.feature_area = feature_area.into();
        self
    }
}

/// A verification artifact linked to zero or more requirements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    /// Allocator-issued identifier (e.g., "TEST-0001")
    pub id: String,

    pub title: String,

    pub test_type: TestType,

    pub priority: Priority,

    /// Requirements this test verifies
    #[serde(default)]
    pub requirement_ids: Vec<String>,

    #[serde(default)]
    pub preconditions: String,

    #[serde(default)]
    pub steps: Vec<String>,

    #[serde(default)]
    pub expected: Vec<String>,
}

impl TestCase {
    /// Creates a test case with no preconditions, steps or expectations
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        test_type: TestType,
        priority: Priority,
        requirement_ids: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            test_type,
            priority,
            requirement_ids,
            preconditions: String::new(),
            steps: Vec::new(),
            expected: Vec::new(),
        }
    }

    /// Returns true if this test verifies the given requirement
    pub fn verifies(&self, requirement_id: &str) -> bool {
        self.requirement_ids.iter().any(|id| id == requirement_id)
    }
}

/// Minimal view of a previously generated test, as read back from prior artifacts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingTest {
    pub id: String,
    #[serde(default)]
    pub requirement_ids: Vec<String>,
}

impl From<&TestCase> for ExistingTest {
    fn from(test: &TestCase) -> Self {
        Self {
            id: test.id.clone(),
            requirement_ids: test.requirement_ids.clone(),
        }
    }
}

/// Structured requirement/test records exchanged between pipeline stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceRecords {
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl TraceRecords {
    pub fn new(requirements: Vec<Requirement>, test_cases: Vec<TestCase>) -> Self {
        Self {
            requirements,
            test_cases,
        }
    }

    /// Load records from a JSON file such as `requirements.json`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SpecTestError::InputNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| SpecTestError::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save records as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SpecTestError::Serialize(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Test records in the shape the impact analyzer consumes
    pub fn existing_tests(&self) -> Vec<ExistingTest> {
        self.test_cases.iter().map(ExistingTest::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::P0 < Priority::P1);
        assert!(Priority::P1 < Priority::P2);
        assert_eq!(Priority::HIGHEST, Priority::P0);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::parse("p0"), Some(Priority::P0));
        assert_eq!(Priority::parse(" P2 "), Some(Priority::P2));
        assert_eq!(Priority::parse("high"), None);
    }

    #[test]
    fn test_test_type_parse_and_display() {
        assert_eq!(TestType::parse("end-to-end"), Some(TestType::E2e));
        assert_eq!(TestType::parse("E2E"), Some(TestType::E2e));
        assert_eq!(TestType::E2e.to_string(), "E2E");
        assert_eq!(TestType::E2e.tag(), "e2e");
    }

    #[test]
    fn test_existing_test_ignores_extra_fields() {
        let json = r#"{"id": "TEST-0001", "title": "t", "requirement_ids": ["REQ-0001"]}"#;
        let test: ExistingTest = serde_json::from_str(json).unwrap();
        assert_eq!(test.id, "TEST-0001");
        assert_eq!(test.requirement_ids, vec!["REQ-0001".to_string()]);
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let records = TraceRecords {
            requirements: vec![Requirement::new("REQ-0001", "Users can log in", Priority::P0)],
            test_cases: vec![TestCase::new(
                "TEST-0001",
                "Verify login",
                TestType::E2e,
                Priority::P0,
                vec!["REQ-0001".to_string()],
            )],
        };

        let json = serde_json::to_string(&records).unwrap();
        assert!(json.contains("\"test_type\":\"e2e\""));

        let loaded: TraceRecords = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.requirements, records.requirements);
        assert!(loaded.test_cases[0].verifies("REQ-0001"));
    }

    #[test]
    fn test_trace_records_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("requirements.json");

        let records = TraceRecords::new(
            vec![Requirement::new("REQ-0001", "Users can log in", Priority::P0)],
            vec![TestCase::new(
                "TEST-0001",
                "Verify login",
                TestType::E2e,
                Priority::P0,
                vec!["REQ-0001".to_string()],
            )],
        );
        records.save(&path).unwrap();

        let loaded = TraceRecords::load(&path).unwrap();
        assert_eq!(loaded.requirements, records.requirements);
        assert_eq!(
            loaded.existing_tests(),
            vec![ExistingTest {
                id: "TEST-0001".to_string(),
                requirement_ids: vec!["REQ-0001".to_string()],
            }]
        );
    }

    #[test]
    fn test_trace_records_rejects_bad_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("records.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            TraceRecords::load(&path),
            Err(SpecTestError::InvalidInput { .. })
        ));
        assert!(matches!(
            TraceRecords::load(temp_dir.path().join("missing.json")),
            Err(SpecTestError::InputNotFound(_))
        ));
    }
}
