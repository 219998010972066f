//! Markdown PRD parser
//!
//! Turns a product requirements document into ordered requirement
//! statements. Recognized layout:
//!
//! ```text
//! # PRD: Title
//! ## Goal
//! free text
//! ## Functional Requirements
//! ### Feature area
//! 1) Statement
//!    - acceptance criterion
//!    - Edge: edge case
//! ## Non-Functional Requirements / Non-Goals / Notes / Open Questions / Edge Cases
//! - item
//! ```

use std::fs;
use std::path::Path;

use crate::error::{Result, SpecTestError};

/// Source of ordered requirement statements for a document
///
/// The impact analyzer only needs statements, so any document format can
/// be compared by implementing this trait.
pub trait DocumentParser {
    fn statements(&self, path: &Path) -> Result<Vec<String>>;
}

/// Kind of requirement statement, by the section it appeared in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Functional,
    NonFunctional,
}

/// A requirement statement together with its nested details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    pub text: String,
    pub kind: StatementKind,
    /// Nearest `###` heading inside the requirements section, may be empty
    pub feature_area: String,
    pub acceptance_criteria: Vec<String>,
    pub edge_cases: Vec<String>,
}

/// Everything extracted from a PRD
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPrd {
    pub title: String,
    pub goal: String,
    pub statements: Vec<ParsedStatement>,
    pub non_goals: Vec<String>,
    pub notes: Vec<String>,
    pub open_questions: Vec<String>,
    /// Document-wide edge cases from an "Edge Cases" section
    pub edge_cases: Vec<String>,
}

impl ParsedPrd {
    /// Functional requirement statements in document order
    pub fn functional_requirements(&self) -> Vec<&str> {
        self.statements_of(StatementKind::Functional)
    }

    /// Non-functional requirement statements in document order
    pub fn non_functional_requirements(&self) -> Vec<&str> {
        self.statements_of(StatementKind::NonFunctional)
    }

    /// All statements: functional first, then non-functional
    pub fn all_statements(&self) -> Vec<String> {
        self.functional_requirements()
            .into_iter()
            .chain(self.non_functional_requirements())
            .map(|s| s.to_string())
            .collect()
    }

    fn statements_of(&self, kind: StatementKind) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.text.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Goal,
    Functional,
    NonFunctional,
    NonGoals,
    Notes,
    OpenQuestions,
    EdgeCases,
    Other,
}

impl Section {
    fn classify(heading: &str) -> Self {
        let h = heading.trim().trim_end_matches(':').to_lowercase();

        if h.contains("non-functional") || h.contains("nonfunctional") || h.contains("non functional") {
            Section::NonFunctional
        } else if h.contains("functional requirement") || h == "requirements" {
            Section::Functional
        } else if h.contains("non-goal") || h.contains("non goal") || h.contains("out of scope") {
            Section::NonGoals
        } else if h.contains("goal") || h.contains("overview") || h.contains("objective") {
            Section::Goal
        } else if h.contains("open question") {
            Section::OpenQuestions
        } else if h.contains("edge case") {
            Section::EdgeCases
        } else if h.contains("note") {
            Section::Notes
        } else {
            Section::Other
        }
    }

    fn statement_kind(&self) -> Option<StatementKind> {
        match self {
            Section::Functional => Some(StatementKind::Functional),
            Section::NonFunctional => Some(StatementKind::NonFunctional),
            _ => None,
        }
    }
}

/// Parser for Markdown PRDs
#[derive(Debug, Clone, Copy, Default)]
pub struct PrdParser;

impl PrdParser {
    pub fn new() -> Self {
        PrdParser
    }

    /// Reads and parses a PRD file
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParsedPrd> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SpecTestError::InputNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let parsed = self.parse_str(&content);

        if parsed.statements.is_empty() {
            log::warn!("No requirement statements found in {}", path.display());
        } else {
            log::debug!(
                "Parsed {} statements from {}",
                parsed.statements.len(),
                path.display()
            );
        }

        Ok(parsed)
    }

    /// Parses PRD Markdown text
    pub fn parse_str(&self, content: &str) -> ParsedPrd {
        let mut prd = ParsedPrd::default();
        let mut section = Section::Preamble;
        let mut feature_area = String::new();
        let mut goal_lines: Vec<String> = Vec::new();
        let mut in_code_block = false;
        // Statement that indented items attach to, only within the current section
        let mut parent: Option<usize> = None;

        for raw in content.lines() {
            if raw.trim_start().starts_with("```") {
                in_code_block = !in_code_block;
                continue;
            }
            if in_code_block {
                continue;
            }

            let line = raw.trim_end();
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(heading) = heading(trimmed) {
                parent = None;
                match heading.level {
                    1 if prd.title.is_empty() => {
                        prd.title = heading.text.to_string();
                    }
                    1 | 2 => {
                        section = Section::classify(heading.text);
                        feature_area.clear();
                    }
                    _ if section.statement_kind().is_some() => {
                        feature_area = heading.text.to_string();
                    }
                    _ => {}
                }
                continue;
            }

            let indent = indentation(line);
            let item = list_item(trimmed);

            if let Some(kind) = section.statement_kind() {
                match item {
                    Some(text) if indent >= 2 && parent.is_some() => {
                        if let Some(current) = parent.and_then(|i| prd.statements.get_mut(i)) {
                            match strip_edge_prefix(text) {
                                Some(edge) => current.edge_cases.push(edge.to_string()),
                                None => current.acceptance_criteria.push(text.to_string()),
                            }
                        }
                    }
                    Some(text) => {
                        prd.statements.push(ParsedStatement {
                            text: text.to_string(),
                            kind,
                            feature_area: feature_area.clone(),
                            acceptance_criteria: Vec::new(),
                            edge_cases: Vec::new(),
                        });
                        parent = Some(prd.statements.len() - 1);
                    }
                    // Wrapped continuation of the previous statement
                    None if indent >= 2 => {
                        if let Some(current) = parent.and_then(|i| prd.statements.get_mut(i)) {
                            if current.acceptance_criteria.is_empty() && current.edge_cases.is_empty() {
                                current.text.push(' ');
                                current.text.push_str(trimmed);
                            }
                        }
                    }
                    None => {}
                }
                continue;
            }

            let text = item.unwrap_or(trimmed).to_string();
            match section {
                Section::Goal => goal_lines.push(text),
                Section::NonGoals => prd.non_goals.push(text),
                Section::Notes => prd.notes.push(text),
                Section::OpenQuestions => prd.open_questions.push(text),
                Section::EdgeCases => prd.edge_cases.push(text),
                _ => {}
            }
        }

        prd.goal = goal_lines.join(" ");
        prd
    }
}

impl DocumentParser for PrdParser {
    fn statements(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self.parse_file(path)?.all_statements())
    }
}

struct Heading<'a> {
    level: usize,
    text: &'a str,
}

fn heading(line: &str) -> Option<Heading<'_>> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }

    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }

    Some(Heading {
        level,
        text: rest.trim(),
    })
}

/// Leading whitespace width, with tabs counted as four columns
fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Text of a list item (`- x`, `* x`, `+ x`, `1) x`, `1. x`), if the line is one
fn list_item(trimmed: &str) -> Option<&str> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            return non_empty(rest);
        }
    }

    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(") ").or_else(|| rest.strip_prefix(". ")) {
            return non_empty(rest);
        }
    }

    None
}

fn non_empty(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn strip_edge_prefix(text: &str) -> Option<&str> {
    for prefix in ["edge case:", "edge:"] {
        match text.get(..prefix.len()) {
            Some(head) if head.eq_ignore_ascii_case(prefix) => {
                return Some(text[prefix.len()..].trim());
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_basic_prd() {
        let prd = PrdParser::new().parse_str(
            "
# PRD: Test Feature

## Goal
Build something cool

## Functional Requirements
1) First requirement
2) Second requirement

## Non-Goals
- Not doing this
- Not doing that
",
        );

        assert_eq!(prd.title, "PRD: Test Feature");
        assert!(prd.goal.contains("cool"));
        assert_eq!(prd.functional_requirements(), vec!["First requirement", "Second requirement"]);
        assert_eq!(prd.non_goals.len(), 2);
    }

    #[test]
    fn test_parse_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = PrdParser::new().parse_file(temp_dir.path().join("nonexistent.md"));
        assert!(matches!(result, Err(SpecTestError::InputNotFound(_))));
    }

    #[test]
    fn test_parse_bullet_lists() {
        let prd = PrdParser::new().parse_str(
            "# PRD: Test\n\n## Functional Requirements\n- First item\n- Second item\n* Third item\n+ Fourth item\n3. Fifth item\n",
        );
        assert_eq!(prd.functional_requirements().len(), 5);
        assert_eq!(prd.functional_requirements()[4], "Fifth item");
    }

    #[test]
    fn test_parse_notes_and_open_questions() {
        let prd = PrdParser::new().parse_str(
            "# PRD: Test\n\n## Notes\n- Important note 1\n- Important note 2\n\n## Open Questions\n- Which IdP?\n",
        );
        assert_eq!(prd.notes.len(), 2);
        assert!(prd.notes[0].contains("Important note 1"));
        assert_eq!(prd.open_questions, vec!["Which IdP?".to_string()]);
    }

    #[test]
    fn test_nested_items_become_criteria_and_edge_cases() {
        let prd = PrdParser::new().parse_str(
            "
## Functional Requirements
### Authentication
1) Users can log in
   - Valid credentials open the dashboard
   - Edge: locked account shows an error
2) Users can log out
### Billing
- Invoices are emailed monthly
",
        );

        assert_eq!(prd.statements.len(), 3);
        let login = &prd.statements[0];
        assert_eq!(login.feature_area, "Authentication");
        assert_eq!(login.acceptance_criteria, vec!["Valid credentials open the dashboard"]);
        assert_eq!(login.edge_cases, vec!["locked account shows an error"]);
        assert_eq!(prd.statements[1].feature_area, "Authentication");
        assert_eq!(prd.statements[2].feature_area, "Billing");
    }

    #[test]
    fn test_indented_item_does_not_cross_sections() {
        let prd = PrdParser::new().parse_str(
            "
## Functional Requirements
- Search works

## Non-Functional Requirements
  - Pages load in under 2s
    - Measured at the 95th percentile
",
        );

        assert!(prd.statements[0].acceptance_criteria.is_empty());
        assert_eq!(prd.functional_requirements(), vec!["Search works"]);
        assert_eq!(prd.non_functional_requirements(), vec!["Pages load in under 2s"]);
        assert_eq!(
            prd.statements[1].acceptance_criteria,
            vec!["Measured at the 95th percentile"]
        );
    }

    #[test]
    fn test_non_functional_section() {
        let prd = PrdParser::new().parse_str(
            "## Functional Requirements\n1) Search works\n\n## Non-Functional Requirements\n1) Pages load in under 2s\n",
        );

        assert_eq!(prd.functional_requirements(), vec!["Search works"]);
        assert_eq!(prd.non_functional_requirements(), vec!["Pages load in under 2s"]);
        assert_eq!(
            prd.all_statements(),
            vec!["Search works".to_string(), "Pages load in under 2s".to_string()]
        );
    }

    #[test]
    fn test_code_blocks_are_ignored() {
        let prd = PrdParser::new().parse_str(
            "## Functional Requirements\n1) Real requirement\n```\n2) Not a requirement\n```\n",
        );
        assert_eq!(prd.functional_requirements(), vec!["Real requirement"]);
    }

    #[test]
    fn test_wrapped_statement_is_joined() {
        let prd = PrdParser::new().parse_str(
            "## Functional Requirements\n1) Users can export reports\n   as CSV files\n",
        );
        assert_eq!(
            prd.functional_requirements(),
            vec!["Users can export reports as CSV files"]
        );
    }

    #[test]
    fn test_document_parser_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prd.md");
        fs::write(&path, "# PRD\n\n## Functional Requirements\n1) Requirement A\n").unwrap();

        let statements = PrdParser::new().statements(&path).unwrap();
        assert_eq!(statements, vec!["Requirement A".to_string()]);
    }
}
