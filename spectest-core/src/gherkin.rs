//! Gherkin feature files, one per feature area

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{Requirement, TestCase, TraceRecords};

/// Subdirectory of the output directory that receives `.feature` files
pub const FEATURES_DIR: &str = "features";

const DEFAULT_AREA: &str = "General";

/// Lower-cases a name and replaces runs of other characters with one underscore
///
/// "A/B Test" becomes "a_b_test".
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if out.is_empty() {
        DEFAULT_AREA.to_lowercase()
    } else {
        out
    }
}

pub struct GherkinGenerator<'a> {
    requirements: &'a [Requirement],
    test_cases: &'a [TestCase],
    output_dir: PathBuf,
}

impl<'a> GherkinGenerator<'a> {
    pub fn new<P: AsRef<Path>>(
        requirements: &'a [Requirement],
        test_cases: &'a [TestCase],
        output_dir: P,
    ) -> Self {
        Self {
            requirements,
            test_cases,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    pub fn from_records<P: AsRef<Path>>(records: &'a TraceRecords, output_dir: P) -> Self {
        Self::new(&records.requirements, &records.test_cases, output_dir)
    }

    /// Requirements grouped by feature area, areas in first-seen order
    fn areas(&self) -> Vec<(&'a str, Vec<&'a Requirement>)> {
        let mut areas: Vec<(&str, Vec<&Requirement>)> = Vec::new();

        for req in self.requirements {
            let area = if req.feature_area.trim().is_empty() {
                DEFAULT_AREA
            } else {
                req.feature_area.as_str()
            };

            match areas.iter_mut().find(|(name, _)| *name == area) {
                Some((_, reqs)) => reqs.push(req),
                None => areas.push((area, vec![req])),
            }
        }

        areas
    }

    /// Writes one feature file per area
    ///
    /// # Returns
    /// Feature area -> written path
    pub fn generate(&self) -> Result<BTreeMap<String, PathBuf>> {
        let features_dir = self.output_dir.join(FEATURES_DIR);
        fs::create_dir_all(&features_dir)?;

        let mut written = BTreeMap::new();
        for (area, reqs) in self.areas() {
            let content = self.render_feature(area, &reqs);
            let path = features_dir.join(format!("{}.feature", sanitize_filename(area)));

            fs::write(&path, content)?;
            log::debug!("Wrote feature file {}", path.display());
            written.insert(area.to_string(), path);
        }

        log::info!(
            "Wrote {} feature files to {}",
            written.len(),
            features_dir.display()
        );
        Ok(written)
    }

    /// Renders the feature file of one area
    pub fn render_feature(&self, area: &str, reqs: &[&Requirement]) -> String {
        let mut output = String::new();

        output.push_str(&format!("Feature: {}\n", area));
        for req in reqs {
            output.push_str(&format!("  {}: {}\n", req.id, req.statement));
        }

        // Each test appears once, under the first requirement of this area it verifies
        let mut rendered: Vec<&str> = Vec::new();

        for req in reqs {
            let tests: Vec<&TestCase> = self
                .test_cases
                .iter()
                .filter(|t| t.verifies(&req.id))
                .collect();

            if tests.is_empty() {
                render_pending(&mut output, req);
                continue;
            }

            for test in tests {
                if rendered.contains(&test.id.as_str()) {
                    continue;
                }
                rendered.push(&test.id);
                render_scenario(&mut output, test);
            }
        }

        output
    }
}

fn render_scenario(output: &mut String, test: &TestCase) {
    let mut tags: Vec<String> = test.requirement_ids.iter().map(|id| format!("@{}", id)).collect();
    tags.push(format!("@{}", test.id));
    tags.push(format!("@{}", test.test_type.tag()));

    output.push('\n');
    output.push_str(&format!("  {}\n", tags.join(" ")));
    output.push_str(&format!("  Scenario: {}\n", test.title));

    if test.preconditions.is_empty() {
        output.push_str("    Given the system is ready\n");
    } else {
        output.push_str(&format!("    Given {}\n", test.preconditions));
    }

    push_clauses(output, "When", &test.steps, "the behavior under test is exercised");
    push_clauses(output, "Then", &test.expected, "the outcome is as specified");
}

/// Placeholder scenarios for a requirement no test verifies yet
fn render_pending(output: &mut String, req: &Requirement) {
    let criteria: Vec<&str> = if req.acceptance_criteria.is_empty() {
        vec![req.statement.as_str()]
    } else {
        req.acceptance_criteria.iter().map(|c| c.as_str()).collect()
    };

    for (i, criterion) in criteria.iter().enumerate() {
        output.push('\n');
        output.push_str(&format!("  @{} @pending\n", req.id));
        output.push_str(&format!("  Scenario: {} criterion {}\n", req.id, i + 1));
        output.push_str(&format!("    Given {} is implemented\n", req.id));
        output.push_str(&format!("    Then {}\n", criterion));
    }
}

fn push_clauses(output: &mut String, keyword: &str, clauses: &[String], fallback: &str) {
    if clauses.is_empty() {
        output.push_str(&format!("    {} {}\n", keyword, fallback));
        return;
    }

    for (i, clause) in clauses.iter().enumerate() {
        let word = if i == 0 { keyword } else { "And" };
        output.push_str(&format!("    {} {}\n", word, clause));
    }
}
