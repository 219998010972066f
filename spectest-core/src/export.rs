//! Markdown and JSON artifacts for a generation result

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::generator::GenerationResult;
use crate::models::{Requirement, TestType};

pub const REQUIREMENTS_FILE: &str = "REQUIREMENTS.md";
pub const TEST_PLAN_FILE: &str = "TEST_PLAN.md";
pub const TRACEABILITY_FILE: &str = "TRACEABILITY.md";
pub const RECORDS_FILE: &str = "requirements.json";

fn title_of(result: &GenerationResult) -> &str {
    if result.title.is_empty() {
        "Requirements Specification"
    } else {
        &result.title
    }
}

/// Requirements grouped by feature area, areas in first-seen order
fn by_feature_area(requirements: &[Requirement]) -> Vec<(&str, Vec<&Requirement>)> {
    let mut groups: Vec<(&str, Vec<&Requirement>)> = Vec::new();

    for req in requirements {
        let area = if req.feature_area.is_empty() {
            "General"
        } else {
            req.feature_area.as_str()
        };

        match groups.iter_mut().find(|(name, _)| *name == area) {
            Some((_, reqs)) => reqs.push(req),
            None => groups.push((area, vec![req])),
        }
    }

    groups
}

/// Export the requirements specification
pub fn export_requirements(result: &GenerationResult, output_path: &Path) -> Result<()> {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", title_of(result)));

    if !result.goal.is_empty() {
        output.push_str(&format!("## Goal\n\n{}\n\n", result.goal));
    }

    output.push_str("## Requirements\n\n");
    for (area, reqs) in by_feature_area(&result.requirements) {
        output.push_str(&format!("### {}\n\n", area));

        for req in reqs {
            output.push_str(&format!("#### {} - {}\n\n", req.id, req.statement));
            output.push_str(&format!("**Priority:** {}\n\n", req.priority));

            output.push_str("**Acceptance Criteria:**\n");
            for criterion in &req.acceptance_criteria {
                output.push_str(&format!("- {}\n", criterion));
            }
            output.push('\n');

            if !req.edge_cases.is_empty() {
                output.push_str("**Edge Cases:**\n");
                for edge in &req.edge_cases {
                    output.push_str(&format!("- {}\n", edge));
                }
                output.push('\n');
            }
        }
    }

    if !result.non_goals.is_empty() {
        output.push_str("## Non-Goals\n\n");
        for item in &result.non_goals {
            output.push_str(&format!("- {}\n", item));
        }
        output.push('\n');
    }

    if !result.open_questions.is_empty() {
        output.push_str("## Open Questions\n\n");
        for question in &result.open_questions {
            output.push_str(&format!("- {}\n", question));
        }
        output.push('\n');
    }

    fs::write(output_path, output)?;
    log::info!(
        "Exported {} requirements to {}",
        result.requirements.len(),
        output_path.display()
    );

    Ok(())
}

/// Export the test plan
pub fn export_test_plan(result: &GenerationResult, output_path: &Path) -> Result<()> {
    let mut output = String::new();

    output.push_str(&format!("# Test Plan: {}\n\n", title_of(result)));

    output.push_str("## Summary\n\n");
    output.push_str("| Test Type | Count |\n");
    output.push_str("|-----------|-------|\n");
    for test_type in TestType::all() {
        let count = result
            .test_cases
            .iter()
            .filter(|t| t.test_type == *test_type)
            .count();
        if count > 0 {
            output.push_str(&format!("| {} | {} |\n", test_type, count));
        }
    }
    output.push_str(&format!("| **Total** | {} |\n\n", result.test_cases.len()));

    output.push_str("## Test Cases\n\n");
    for test in &result.test_cases {
        output.push_str(&format!("### {}: {}\n\n", test.id, test.title));
        output.push_str(&format!(
            "**Type:** {} | **Priority:** {} | **Verifies:** {}\n\n",
            test.test_type,
            test.priority,
            test.requirement_ids.join(", ")
        ));

        if !test.preconditions.is_empty() {
            output.push_str(&format!("**Preconditions:** {}\n\n", test.preconditions));
        }

        if !test.steps.is_empty() {
            output.push_str("**Steps:**\n");
            for (i, step) in test.steps.iter().enumerate() {
                output.push_str(&format!("{}. {}\n", i + 1, step));
            }
            output.push('\n');
        }

        if !test.expected.is_empty() {
            output.push_str("**Expected:**\n");
            for expected in &test.expected {
                output.push_str(&format!("- {}\n", expected));
            }
            output.push('\n');
        }
    }

    fs::write(output_path, output)?;
    log::info!(
        "Exported {} test cases to {}",
        result.test_cases.len(),
        output_path.display()
    );

    Ok(())
}

/// Export the requirement -> test traceability matrix
pub fn export_traceability(result: &GenerationResult, output_path: &Path) -> Result<()> {
    let mut output = String::new();

    output.push_str(&format!("# Traceability Matrix: {}\n\n", title_of(result)));
    output.push_str("| Requirement | Priority | Feature Area | Tests | Test Types |\n");
    output.push_str("|-------------|----------|--------------|-------|------------|\n");

    for req in &result.requirements {
        let tests: Vec<_> = result.tests_for(&req.id).collect();

        let test_ids = if tests.is_empty() {
            "-".to_string()
        } else {
            tests.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(", ")
        };

        let mut types: Vec<TestType> = tests.iter().map(|t| t.test_type).collect();
        types.sort();
        types.dedup();
        let types = if types.is_empty() {
            "-".to_string()
        } else {
            types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
        };

        output.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            req.id, req.priority, req.feature_area, test_ids, types
        ));
    }

    fs::write(output_path, output)?;
    log::info!("Exported traceability matrix to {}", output_path.display());

    Ok(())
}

/// Export requirement and test records as JSON
pub fn export_json(result: &GenerationResult, output_path: &Path) -> Result<()> {
    result.records().save(output_path)?;
    log::info!("Exported records to {}", output_path.display());
    Ok(())
}

/// Writes every artifact into `output_dir`
///
/// # Returns
/// Artifact file name -> written path
pub fn write_all(result: &GenerationResult, output_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let exporters: [(&str, fn(&GenerationResult, &Path) -> Result<()>); 4] = [
        (REQUIREMENTS_FILE, export_requirements),
        (TEST_PLAN_FILE, export_test_plan),
        (TRACEABILITY_FILE, export_traceability),
        (RECORDS_FILE, export_json),
    ];

    let mut written = BTreeMap::new();
    for (name, export) in exporters {
        let path = output_dir.join(name);
        export(result, &path)?;
        written.insert(name.to_string(), path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TestCase};
    use tempfile::TempDir;

    fn sample() -> GenerationResult {
        let mut login = TestCase::new(
            "TEST-0001",
            "Verify login",
            TestType::E2e,
            Priority::P0,
            vec!["REQ-0001".to_string()],
        );
        login.preconditions = "User exists".to_string();
        login.steps = vec!["Enter credentials".to_string(), "Submit".to_string()];
        login.expected = vec!["Dashboard is shown".to_string()];

        GenerationResult {
            title: "PRD: Accounts".to_string(),
            goal: "Let users manage accounts".to_string(),
            requirements: vec![
                Requirement::new("REQ-0001", "Users can log in", Priority::P0)
                    .with_acceptance_criteria(vec!["Valid credentials succeed".to_string()])
                    .with_edge_cases(vec!["Locked account".to_string()])
                    .with_feature_area("Authentication"),
                Requirement::new("REQ-0002", "Users can export data", Priority::P2),
            ],
            test_cases: vec![login],
            non_goals: vec!["Social login".to_string()],
            open_questions: vec!["Which IdP?".to_string()],
        }
    }

    #[test]
    fn test_export_requirements() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(REQUIREMENTS_FILE);

        export_requirements(&sample(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("# PRD: Accounts"));
        assert!(content.contains("### Authentication"));
        assert!(content.contains("#### REQ-0001 - Users can log in"));
        assert!(content.contains("- Locked account"));
        assert!(content.contains("### General"));
        assert!(content.contains("## Non-Goals\n\n- Social login"));
        assert!(content.contains("## Open Questions\n\n- Which IdP?"));
    }

    #[test]
    fn test_export_test_plan() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(TEST_PLAN_FILE);

        export_test_plan(&sample(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.contains("| E2E | 1 |"));
        assert!(content.contains("### TEST-0001: Verify login"));
        assert!(content.contains("**Verifies:** REQ-0001"));
        assert!(content.contains("1. Enter credentials\n2. Submit"));
    }

    #[test]
    fn test_export_traceability() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(TRACEABILITY_FILE);

        export_traceability(&sample(), &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(content.contains("| REQ-0001 | P0 | Authentication | TEST-0001 | E2E |"));
        assert!(content.contains("| REQ-0002 | P2 |  | - | - |"));
    }

    #[test]
    fn test_write_all() {
        let temp_dir = TempDir::new().unwrap();
        let out_dir = temp_dir.path().join("spec");

        let written = write_all(&sample(), &out_dir).unwrap();

        let names: Vec<&str> = written.keys().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![REQUIREMENTS_FILE, TEST_PLAN_FILE, TRACEABILITY_FILE, RECORDS_FILE]
        );
        assert!(written.values().all(|p| p.exists()));
    }
}
