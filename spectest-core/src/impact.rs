//! Change impact analysis between two versions of a requirements document

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocator::IdAllocator;
use crate::config::{ImpactPolicy, PolicyConfig};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::models::ExistingTest;
use crate::parser::{DocumentParser, PrdParser};

/// File name of the rendered impact report
pub const IMPACT_REPORT_FILE: &str = "IMPACT_REPORT.md";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    /// Only produced when similarity pairing is enabled
    Modified,
}

impl ChangeType {
    fn label(&self) -> &'static str {
        match self {
            ChangeType::Added => "Added",
            ChangeType::Removed => "Removed",
            ChangeType::Modified => "Modified",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Removed => write!(f, "removed"),
            ChangeType::Modified => write!(f, "modified"),
        }
    }
}

/// One difference between the baseline and current statements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Change {
    pub change_type: ChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Stable ID of the affected statement (the baseline one for modifications)
    pub requirement_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Scores a change set
    ///
    /// A modification counts as a removal: tests may reference the old text.
    pub fn score(changes: &[Change], policy: &ImpactPolicy) -> Self {
        let removals = changes
            .iter()
            .filter(|c| c.change_type != ChangeType::Added)
            .count();
        let additions = changes.len() - removals;

        if removals >= policy.critical_removals {
            RiskLevel::Critical
        } else if removals > 0 {
            RiskLevel::High
        } else if additions > 0 && additions >= policy.medium_additions {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result of comparing two document versions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImpactReport {
    pub baseline: PathBuf,
    pub current: PathBuf,
    pub changes: Vec<Change>,
    pub risk_level: RiskLevel,
    /// Existing tests linked to a changed requirement, first-seen order
    pub affected_tests: Vec<String>,
}

impl ImpactReport {
    pub fn count(&self, change_type: ChangeType) -> usize {
        self.changes
            .iter()
            .filter(|c| c.change_type == change_type)
            .count()
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Renders the report as Markdown
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Change Impact Report\n\n");
        output.push_str(&format!("**Baseline:** {}\n", self.baseline.display()));
        output.push_str(&format!("**Current:** {}\n\n", self.current.display()));
        output.push_str(&format!("**Risk Level:** {}\n\n", self.risk_level));

        output.push_str("## Summary\n\n");
        output.push_str(&format!("- Added: {}\n", self.count(ChangeType::Added)));
        output.push_str(&format!("- Removed: {}\n", self.count(ChangeType::Removed)));
        let modified = self.count(ChangeType::Modified);
        if modified > 0 {
            output.push_str(&format!("- Modified: {}\n", modified));
        }
        output.push_str(&format!("- Affected tests: {}\n\n", self.affected_tests.len()));

        output.push_str("## Changes\n\n");
        if self.changes.is_empty() {
            output.push_str("No changes detected.\n\n");
        } else {
            for change in &self.changes {
                let label = change.change_type.label();
                match (&change.old_value, &change.new_value) {
                    (Some(old), Some(new)) => output.push_str(&format!(
                        "- **{}** `{}`: {} -> {}\n",
                        label, change.requirement_id, old, new
                    )),
                    (Some(text), None) | (None, Some(text)) => output.push_str(&format!(
                        "- **{}** `{}`: {}\n",
                        label, change.requirement_id, text
                    )),
                    (None, None) => output.push_str(&format!(
                        "- **{}** `{}`\n",
                        label, change.requirement_id
                    )),
                }
            }
            output.push('\n');
        }

        if !self.affected_tests.is_empty() {
            output.push_str("## Affected Tests\n\n");
            for test_id in &self.affected_tests {
                output.push_str(&format!("- {}\n", test_id));
            }
            output.push('\n');
        }

        output
    }

    /// Writes `IMPACT_REPORT.md` into `directory`, creating it if needed
    pub fn write_to<P: AsRef<Path>>(&self, directory: P) -> Result<PathBuf> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;

        let path = directory.join(IMPACT_REPORT_FILE);
        fs::write(&path, self.to_markdown())?;

        log::info!("Wrote impact report to {}", path.display());
        Ok(path)
    }
}

/// Compares document versions and resolves changed statements to stable IDs
pub struct ImpactAnalyzer {
    allocator: IdAllocator,
    policy: ImpactPolicy,
    parser: Box<dyn DocumentParser>,
    output_dir: PathBuf,
}

impl ImpactAnalyzer {
    /// Opens the identifier store in `work_dir`; reports are written there too
    pub fn new<P: AsRef<Path>>(work_dir: P) -> Result<Self> {
        Self::with_policy(work_dir, &PolicyConfig::default())
    }

    pub fn with_policy<P: AsRef<Path>>(work_dir: P, policy: &PolicyConfig) -> Result<Self> {
        let work_dir = work_dir.as_ref();
        let allocator = IdAllocator::open_with_policy(work_dir, policy)?;
        Ok(Self::from_allocator(allocator, policy.impact.clone(), work_dir))
    }

    pub fn from_allocator<P: AsRef<Path>>(
        allocator: IdAllocator,
        policy: ImpactPolicy,
        output_dir: P,
    ) -> Self {
        Self {
            allocator,
            policy,
            parser: Box::new(PrdParser::new()),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Replaces the document parser
    pub fn with_parser(mut self, parser: Box<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Directory `write_report` writes into
    pub fn with_output_dir<P: AsRef<Path>>(mut self, output_dir: P) -> Self {
        self.output_dir = output_dir.as_ref().to_path_buf();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    /// Statements of a document keyed by fingerprint, first occurrence wins
    fn fingerprinted(&self, path: &Path) -> Result<Vec<(Fingerprint, String)>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for statement in self.parser.statements(path)? {
            let fp = self.allocator.fingerprint(&statement);
            if seen.insert(fp.clone()) {
                out.push((fp, statement));
            }
        }

        Ok(out)
    }

    /// Compares two documents
    ///
    /// Every changed statement is resolved to its stable ID, allocating one
    /// if the statement has never been seen.
    pub fn compare<P1: AsRef<Path>, P2: AsRef<Path>>(
        &mut self,
        baseline: P1,
        current: P2,
        existing_tests: Option<&[ExistingTest]>,
    ) -> Result<ImpactReport> {
        let baseline = baseline.as_ref();
        let current = current.as_ref();

        let old = self.fingerprinted(baseline)?;
        let new = self.fingerprinted(current)?;

        let old_keys: HashSet<&Fingerprint> = old.iter().map(|(fp, _)| fp).collect();
        let new_keys: HashSet<&Fingerprint> = new.iter().map(|(fp, _)| fp).collect();

        let removed: Vec<&(Fingerprint, String)> =
            old.iter().filter(|(fp, _)| !new_keys.contains(fp)).collect();
        let added: Vec<&(Fingerprint, String)> =
            new.iter().filter(|(fp, _)| !old_keys.contains(fp)).collect();

        // Removal index -> addition index
        let pairs = match self.policy.modified_similarity {
            Some(threshold) => pair_modifications(&removed, &added, threshold),
            None => HashMap::new(),
        };
        let paired_additions: HashSet<usize> = pairs.values().copied().collect();

        let mut changes = Vec::with_capacity(removed.len() + added.len());
        let mut changed_ids = HashSet::new();

        for (i, (fp, statement)) in removed.iter().map(|e| (&e.0, &e.1)).enumerate() {
            let requirement_id = self.allocator.requirement_id(fp)?;
            changed_ids.insert(requirement_id.clone());

            match pairs.get(&i) {
                Some(&j) => {
                    let (new_fp, new_statement) = (&added[j].0, &added[j].1);
                    changed_ids.insert(self.allocator.requirement_id(new_fp)?);
                    changes.push(Change {
                        change_type: ChangeType::Modified,
                        old_value: Some(statement.clone()),
                        new_value: Some(new_statement.clone()),
                        requirement_id,
                    });
                }
                None => changes.push(Change {
                    change_type: ChangeType::Removed,
                    old_value: Some(statement.clone()),
                    new_value: None,
                    requirement_id,
                }),
            }
        }

        for (j, (fp, statement)) in added.iter().map(|e| (&e.0, &e.1)).enumerate() {
            if paired_additions.contains(&j) {
                continue;
            }

            let requirement_id = self.allocator.requirement_id(fp)?;
            changed_ids.insert(requirement_id.clone());
            changes.push(Change {
                change_type: ChangeType::Added,
                old_value: None,
                new_value: Some(statement.clone()),
                requirement_id,
            });
        }

        let affected_tests = existing_tests
            .map(|tests| affected_tests(tests, &changed_ids))
            .unwrap_or_default();
        let risk_level = RiskLevel::score(&changes, &self.policy);

        log::debug!(
            "Compared {} with {}: {} changes, risk {}",
            baseline.display(),
            current.display(),
            changes.len(),
            risk_level
        );

        Ok(ImpactReport {
            baseline: baseline.to_path_buf(),
            current: current.to_path_buf(),
            changes,
            risk_level,
            affected_tests,
        })
    }

    /// Compares two documents and writes `IMPACT_REPORT.md` into the output directory
    pub fn write_report<P1: AsRef<Path>, P2: AsRef<Path>>(
        &mut self,
        baseline: P1,
        current: P2,
    ) -> Result<PathBuf> {
        let report = self.compare(baseline, current, None)?;
        report.write_to(&self.output_dir)
    }
}

/// Test IDs whose requirements intersect `changed_ids`, deduplicated in list order
fn affected_tests(tests: &[ExistingTest], changed_ids: &HashSet<String>) -> Vec<String> {
    let mut affected: Vec<String> = Vec::new();

    for test in tests {
        let hit = test.requirement_ids.iter().any(|id| changed_ids.contains(id));
        if hit && !affected.contains(&test.id) {
            affected.push(test.id.clone());
        }
    }

    affected
}

/// Pairs each removal with the first unpaired addition at least `threshold` similar
fn pair_modifications(
    removed: &[&(Fingerprint, String)],
    added: &[&(Fingerprint, String)],
    threshold: f64,
) -> HashMap<usize, usize> {
    let mut pairs = HashMap::new();
    let mut taken = vec![false; added.len()];

    for (i, (_, old)) in removed.iter().map(|e| (&e.0, &e.1)).enumerate() {
        let candidate = added
            .iter()
            .enumerate()
            .find(|(j, entry)| !taken[*j] && similarity(old, &entry.1) >= threshold);

        if let Some((j, _)) = candidate {
            taken[j] = true;
            pairs.insert(i, j);
        }
    }

    pairs
}

fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Jaccard similarity of the word sets of two statements
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = tokens(a);
    let b = tokens(b);

    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}
