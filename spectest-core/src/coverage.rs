//! Coverage gap analysis between requirements and test cases

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::CoveragePolicy;
use crate::error::Result;
use crate::models::{Priority, Requirement, TestCase, TestType};

/// File name of the rendered coverage report
pub const COVERAGE_REPORT_FILE: &str = "COVERAGE_REPORT.md";

/// Kind of verification gap
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    /// No test verifies the requirement
    NoTests,
    /// A test type required by policy is missing
    TypeMissing,
    /// Acceptance criteria only partly exercised (reserved, not produced yet)
    Partial,
}

impl fmt::Display for GapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapType::NoTests => write!(f, "no_tests"),
            GapType::TypeMissing => write!(f, "type_missing"),
            GapType::Partial => write!(f, "partial"),
        }
    }
}

/// Gap severity, most severe first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[Severity::Critical, Severity::High, Severity::Medium, Severity::Low]
    }

    fn heading(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// A requirement failing a verification rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Gap {
    pub gap_type: GapType,
    pub severity: Severity,
    pub requirement_id: String,
    pub description: String,
}

/// Coverage of a single requirement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequirementCoverage {
    pub requirement_id: String,
    pub priority: Priority,
    /// Covering tests, in test case order
    pub test_ids: Vec<String>,
    /// Distinct test types among the covering tests, sorted
    pub test_types: Vec<TestType>,
}

/// Result of a coverage analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    pub total_requirements: usize,
    pub covered_requirements: usize,
    pub coverage_percentage: f64,
    pub gaps: Vec<Gap>,
    pub entries: Vec<RequirementCoverage>,
}

impl CoverageReport {
    /// Gaps with the given severity, in requirement order
    pub fn gaps_with_severity(&self, severity: Severity) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(move |g| g.severity == severity)
    }

    /// Renders the report as Markdown
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Test Coverage Gap Analysis\n\n");
        output.push_str(&format!(
            "**Overall Coverage:** {:.1}% ({}/{} requirements covered)\n\n",
            self.coverage_percentage, self.covered_requirements, self.total_requirements
        ));

        output.push_str("## Gaps\n\n");
        if self.gaps.is_empty() {
            output.push_str("No coverage gaps found.\n\n");
        } else {
            output.push_str(&format!("Total gaps: {}\n\n", self.gaps.len()));
            for severity in Severity::all() {
                let gaps: Vec<&Gap> = self.gaps_with_severity(*severity).collect();
                if gaps.is_empty() {
                    continue;
                }

                output.push_str(&format!("### {} ({})\n\n", severity.heading(), gaps.len()));
                for gap in gaps {
                    output.push_str(&format!(
                        "- **{}** [{}] {}\n",
                        gap.gap_type, gap.severity, gap.description
                    ));
                }
                output.push('\n');
            }
        }

        if !self.entries.is_empty() {
            output.push_str("## Requirement Coverage\n\n");
            output.push_str("| Requirement | Priority | Tests | Test Types |\n");
            output.push_str("|-------------|----------|-------|------------|\n");
            for entry in &self.entries {
                let tests = if entry.test_ids.is_empty() {
                    "-".to_string()
                } else {
                    entry.test_ids.join(", ")
                };
                let types = if entry.test_types.is_empty() {
                    "-".to_string()
                } else {
                    entry
                        .test_types
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                output.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    entry.requirement_id, entry.priority, tests, types
                ));
            }
            output.push('\n');
        }

        output
    }

    /// Writes `COVERAGE_REPORT.md` into `directory`, creating it if needed
    pub fn write_to<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        let path = directory.join(COVERAGE_REPORT_FILE);
        fs::write(&path, self.to_markdown())?;

        log::info!("Wrote coverage report to {}", path.display());
        Ok(path)
    }
}

/// Computes coverage and gaps for a set of requirements and tests
pub struct CoverageAnalyzer<'a> {
    requirements: &'a [Requirement],
    test_cases: &'a [TestCase],
    policy: CoveragePolicy,
}

impl<'a> CoverageAnalyzer<'a> {
    /// Creates an analyzer with the default policy (P0 requires an E2E test)
    pub fn new(requirements: &'a [Requirement], test_cases: &'a [TestCase]) -> Self {
        Self {
            requirements,
            test_cases,
            policy: CoveragePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CoveragePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Requirement id -> tests that list it, each test at most once
    fn reverse_index(&self) -> HashMap<&'a str, Vec<&'a TestCase>> {
        let mut index: HashMap<&str, Vec<&TestCase>> = HashMap::new();

        for test in self.test_cases {
            for req_id in &test.requirement_ids {
                let covering = index.entry(req_id.as_str()).or_default();
                if !covering.iter().any(|t| t.id == test.id) {
                    covering.push(test);
                }
            }
        }

        index
    }

    pub fn analyze(&self) -> CoverageReport {
        let index = self.reverse_index();
        let mut gaps = Vec::new();
        let mut entries = Vec::with_capacity(self.requirements.len());
        let mut covered = 0;

        for req in self.requirements {
            let covering = index.get(req.id.as_str()).map(|v| v.as_slice()).unwrap_or(&[]);

            let mut test_types: Vec<TestType> = covering.iter().map(|t| t.test_type).collect();
            test_types.sort();
            test_types.dedup();

            if covering.is_empty() {
                gaps.push(Gap {
                    gap_type: GapType::NoTests,
                    severity: Severity::Critical,
                    requirement_id: req.id.clone(),
                    description: format!("{} has no tests", req.id),
                });
            } else {
                covered += 1;

                for required in self.policy.required_for(req.priority) {
                    if !test_types.contains(required) {
                        gaps.push(Gap {
                            gap_type: GapType::TypeMissing,
                            severity: Severity::High,
                            requirement_id: req.id.clone(),
                            description: format!(
                                "{} is {} but has no {} test",
                                req.id, req.priority, required
                            ),
                        });
                    }
                }
            }

            entries.push(RequirementCoverage {
                requirement_id: req.id.clone(),
                priority: req.priority,
                test_ids: covering.iter().map(|t| t.id.clone()).collect(),
                test_types,
            });
        }

        let total = self.requirements.len();
        let coverage_percentage = if total > 0 {
            covered as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        log::debug!(
            "Coverage: {}/{} requirements, {} gaps",
            covered,
            total,
            gaps.len()
        );

        CoverageReport {
            total_requirements: total,
            covered_requirements: covered,
            coverage_percentage,
            gaps,
            entries,
        }
    }

    /// Analyzes and writes `COVERAGE_REPORT.md` into `directory`
    pub fn write_report<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf> {
        self.analyze().write_to(directory)
    }
}
