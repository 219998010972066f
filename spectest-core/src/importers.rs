//! Requirement importers for issue-tracker JSON exports (Jira, Linear)

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::allocator::IdAllocator;
use crate::error::{Result, SpecTestError};
use crate::generator::default_acceptance_criterion;
use crate::models::{Priority, Requirement};

fn read_export<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(SpecTestError::InputNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| SpecTestError::InvalidInput {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Bullet items under an "Acceptance Criteria" heading of an issue description
///
/// Accepts Markdown (`## Acceptance Criteria`, `- item`) and Jira wiki markup
/// (`h2. Acceptance Criteria`, `* item`, `# item`).
pub fn extract_acceptance_criteria(description: &str) -> Vec<String> {
    let mut criteria = Vec::new();
    let mut in_section = false;

    for line in description.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();

        if !in_section {
            in_section = lowered
                .trim_start_matches(|c: char| c == '#' || c.is_whitespace())
                .trim_start_matches(|c: char| c == 'h' || c.is_ascii_digit() || c == '.' || c == ' ')
                .trim_end_matches(':')
                .starts_with("acceptance criteria");
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }
        if is_heading(trimmed) {
            break;
        }

        match bullet(trimmed) {
            Some(item) => criteria.push(item.to_string()),
            None if criteria.is_empty() => {}
            None => break,
        }
    }

    criteria
}

fn is_heading(line: &str) -> bool {
    if line.starts_with("# ") && line.len() > 2 {
        // A single `#` is a numbered item in Jira wiki markup
        return line.starts_with("##");
    }
    if line.starts_with("##") {
        return true;
    }

    let bytes = line.as_bytes();
    bytes.len() > 3 && bytes[0] == b'h' && bytes[1].is_ascii_digit() && bytes[2] == b'.'
}

fn bullet(line: &str) -> Option<&str> {
    ["- ", "* ", "+ ", "# "]
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Assigns an ID and skips statements already imported in this batch
fn push_requirement(
    allocator: &mut IdAllocator,
    requirements: &mut Vec<Requirement>,
    statement: &str,
    priority: Priority,
    criteria: Vec<String>,
    feature_area: String,
) -> Result<()> {
    let statement = statement.trim();
    if statement.is_empty() {
        log::warn!("Skipping issue without a title");
        return Ok(());
    }

    let id = allocator.requirement_id_for(statement)?;
    if requirements.iter().any(|r| r.id == id) {
        log::warn!("Skipping duplicate issue {}: {}", id, statement);
        return Ok(());
    }

    let criteria = if criteria.is_empty() {
        vec![default_acceptance_criterion(statement)]
    } else {
        criteria
    };

    requirements.push(
        Requirement::new(id, statement, priority)
            .with_acceptance_criteria(criteria)
            .with_feature_area(feature_area),
    );
    Ok(())
}

#[derive(Debug, Deserialize)]
struct JiraExport {
    #[serde(default)]
    issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    #[serde(default)]
    key: Option<String>,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: String,
    /// Plain text, or an Atlassian document object which is ignored
    #[serde(default)]
    description: Option<serde_json::Value>,
    #[serde(default)]
    priority: Option<JiraPriority>,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct JiraPriority {
    pub name: String,
}

/// Imports requirements from a Jira JSON export (`{"issues": [...]}`)
pub struct JiraImporter<'a> {
    allocator: &'a mut IdAllocator,
}

impl<'a> JiraImporter<'a> {
    pub fn new(allocator: &'a mut IdAllocator) -> Self {
        Self { allocator }
    }

    pub fn map_priority(priority: Option<&JiraPriority>) -> Priority {
        let name = priority.map(|p| p.name.to_lowercase()).unwrap_or_default();
        match name.as_str() {
            "highest" | "blocker" | "critical" => Priority::P0,
            "low" | "lowest" | "trivial" | "minor" => Priority::P2,
            _ => Priority::P1,
        }
    }

    pub fn import_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Requirement>> {
        let path = path.as_ref();
        let export: JiraExport = read_export(path)?;
        let mut requirements = Vec::new();

        for issue in export.issues {
            let fields = issue.fields;
            let description = fields
                .description
                .as_ref()
                .and_then(|d| d.as_str())
                .unwrap_or("");

            push_requirement(
                self.allocator,
                &mut requirements,
                &fields.summary,
                Self::map_priority(fields.priority.as_ref()),
                extract_acceptance_criteria(description),
                fields.labels.first().cloned().unwrap_or_default(),
            )?;

            if let (Some(key), Some(req)) = (&issue.key, requirements.last()) {
                log::debug!("Imported Jira issue {} as {}", key, req.id);
            }
        }

        log::info!(
            "Imported {} requirements from Jira export {}",
            requirements.len(),
            path.display()
        );
        Ok(requirements)
    }
}

#[derive(Debug, Deserialize)]
struct LinearExport {
    #[serde(default)]
    issues: Vec<LinearIssue>,
}

#[derive(Debug, Deserialize)]
struct LinearIssue {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<u8>,
    #[serde(default)]
    project: Option<LinearProject>,
}

#[derive(Debug, Deserialize)]
struct LinearProject {
    #[serde(default)]
    name: String,
}

/// Imports requirements from a Linear JSON export (`{"issues": [...]}`)
pub struct LinearImporter<'a> {
    allocator: &'a mut IdAllocator,
}

impl<'a> LinearImporter<'a> {
    pub fn new(allocator: &'a mut IdAllocator) -> Self {
        Self { allocator }
    }

    /// Linear priorities: 1 urgent, 2 high, 3 medium, 4 low, 0 none
    pub fn map_priority(priority: Option<u8>) -> Priority {
        match priority {
            Some(1) => Priority::P0,
            Some(2) | Some(3) => Priority::P1,
            _ => Priority::P2,
        }
    }

    pub fn import_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Requirement>> {
        let path = path.as_ref();
        let export: LinearExport = read_export(path)?;
        let mut requirements = Vec::new();

        for issue in export.issues {
            let description = issue.description.as_deref().unwrap_or("");

            push_requirement(
                self.allocator,
                &mut requirements,
                &issue.title,
                Self::map_priority(issue.priority),
                extract_acceptance_criteria(description),
                issue.project.map(|p| p.name).unwrap_or_default(),
            )?;

            if let (Some(identifier), Some(req)) = (&issue.identifier, requirements.last()) {
                log::debug!("Imported Linear issue {} as {}", identifier, req.id);
            }
        }

        log::info!(
            "Imported {} requirements from Linear export {}",
            requirements.len(),
            path.display()
        );
        Ok(requirements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_json(dir: &Path, name: &str, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn test_jira_import_single_issue() {
        let temp_dir = TempDir::new().unwrap();
        let export = write_json(
            temp_dir.path(),
            "jira_export.json",
            serde_json::json!({
                "issues": [{
                    "key": "PROJ-123",
                    "fields": {
                        "summary": "Implement user login",
                        "description": "Users should be able to log in",
                        "priority": {"name": "High"},
                        "labels": ["authentication"]
                    }
                }]
            }),
        );

        let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();
        let requirements = JiraImporter::new(&mut allocator)
            .import_from_file(&export)
            .unwrap();

        assert_eq!(requirements.len(), 1);
        assert_eq!(requirements[0].id, "REQ-0001");
        assert!(requirements[0].statement.to_lowercase().contains("implement user login"));
        assert_eq!(requirements[0].priority, Priority::P1);
        assert_eq!(requirements[0].feature_area, "authentication");
    }

    #[test]
    fn test_jira_acceptance_criteria() {
        let temp_dir = TempDir::new().unwrap();
        let export = write_json(
            temp_dir.path(),
            "jira_export.json",
            serde_json::json!({
                "issues": [{
                    "fields": {
                        "summary": "Add search feature",
                        "description": "## Acceptance Criteria\n- Search by name\n- Search by email\n\n## Notes\nOther stuff",
                        "priority": {"name": "Medium"}
                    }
                }]
            }),
        );

        let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();
        let requirements = JiraImporter::new(&mut allocator)
            .import_from_file(&export)
            .unwrap();

        assert_eq!(
            requirements[0].acceptance_criteria,
            vec!["Search by name".to_string(), "Search by email".to_string()]
        );
    }

    #[test]
    fn test_jira_priority_mapping() {
        let p = |name: &str| JiraPriority {
            name: name.to_string(),
        };

        assert_eq!(JiraImporter::map_priority(Some(&p("Highest"))), Priority::P0);
        assert_eq!(JiraImporter::map_priority(Some(&p("High"))), Priority::P1);
        assert_eq!(JiraImporter::map_priority(Some(&p("Low"))), Priority::P2);
        assert_eq!(JiraImporter::map_priority(None), Priority::P1);
    }

    #[test]
    fn test_jira_ids_are_stable() {
        let temp_dir = TempDir::new().unwrap();
        let export = write_json(
            temp_dir.path(),
            "jira.json",
            serde_json::json!({
                "issues": [
                    {"fields": {"summary": "First"}},
                    {"fields": {"summary": "Second"}},
                    {"fields": {"summary": "First."}}
                ]
            }),
        );

        let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();
        let first = JiraImporter::new(&mut allocator).import_from_file(&export).unwrap();
        let second = JiraImporter::new(&mut allocator).import_from_file(&export).unwrap();

        // "First." normalizes to the same fingerprint as "First"
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_linear_import_single_issue() {
        let temp_dir = TempDir::new().unwrap();
        let export = write_json(
            temp_dir.path(),
            "linear_export.json",
            serde_json::json!({
                "issues": [{
                    "title": "Implement dashboard",
                    "description": "Create main dashboard view",
                    "priority": 2,
                    "project": {"name": "Frontend"}
                }]
            }),
        );

        let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();
        let requirements = LinearImporter::new(&mut allocator)
            .import_from_file(&export)
            .unwrap();

        assert_eq!(requirements.len(), 1);
        assert!(requirements[0].statement.to_lowercase().contains("implement dashboard"));
        assert_eq!(requirements[0].priority, Priority::P1);
        assert_eq!(requirements[0].feature_area, "Frontend");
        assert_eq!(
            requirements[0].acceptance_criteria,
            vec!["Implement dashboard is demonstrably satisfied".to_string()]
        );
    }

    #[test]
    fn test_linear_priority_mapping() {
        assert_eq!(LinearImporter::map_priority(Some(1)), Priority::P0);
        assert_eq!(LinearImporter::map_priority(Some(2)), Priority::P1);
        assert_eq!(LinearImporter::map_priority(Some(3)), Priority::P1);
        assert_eq!(LinearImporter::map_priority(Some(4)), Priority::P2);
        assert_eq!(LinearImporter::map_priority(Some(0)), Priority::P2);
        assert_eq!(LinearImporter::map_priority(None), Priority::P2);
    }

    #[test]
    fn test_import_errors() {
        let temp_dir = TempDir::new().unwrap();
        let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();

        let missing = LinearImporter::new(&mut allocator).import_from_file(temp_dir.path().join("nope.json"));
        assert!(matches!(missing, Err(SpecTestError::InputNotFound(_))));

        let bad = temp_dir.path().join("bad.json");
        fs::write(&bad, "[1, 2").unwrap();
        let invalid = JiraImporter::new(&mut allocator).import_from_file(&bad);
        assert!(matches!(invalid, Err(SpecTestError::InvalidInput { .. })));
    }

    #[test]
    fn test_extract_acceptance_criteria_wiki_markup() {
        let description = "Intro text\n\nh3. Acceptance Criteria\n* Exports CSV\n# Exports JSON\n\nh3. Notes\n* not a criterion";
        assert_eq!(
            extract_acceptance_criteria(description),
            vec!["Exports CSV".to_string(), "Exports JSON".to_string()]
        );
        assert!(extract_acceptance_criteria("No criteria here").is_empty());
    }
}
