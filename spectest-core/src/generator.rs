//! PRD to requirement and test case generation
//!
//! `SpecTestGenerator` parses a PRD, gives every statement a stable
//! requirement ID through the allocator, derives test cases from the
//! acceptance criteria and the coverage policy, and collects open questions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::allocator::IdAllocator;
use crate::config::PolicyConfig;
use crate::error::Result;
use crate::export;
use crate::fingerprint::Fingerprint;
use crate::models::{Requirement, TestCase, TestType, TraceRecords};
use crate::parser::{ParsedStatement, PrdParser, StatementKind};

/// Feature area given to non-functional statements without a subheading
pub const NON_FUNCTIONAL_AREA: &str = "Non-Functional";

/// Words that make a requirement hard to verify
pub const AMBIGUOUS_TERMS: &[&str] = &[
    "fast",
    "quickly",
    "easy",
    "simple",
    "user-friendly",
    "intuitive",
    "etc",
    "appropriate",
    "robust",
    "scalable",
    "efficient",
    "flexible",
    "seamless",
];

/// Everything produced from one PRD
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub title: String,
    pub goal: String,
    pub requirements: Vec<Requirement>,
    pub test_cases: Vec<TestCase>,
    pub non_goals: Vec<String>,
    pub open_questions: Vec<String>,
}

impl GenerationResult {
    /// The requirement and test records, as written to `requirements.json`
    pub fn records(&self) -> TraceRecords {
        TraceRecords::new(self.requirements.clone(), self.test_cases.clone())
    }

    pub fn tests_for<'a>(&'a self, requirement_id: &'a str) -> impl Iterator<Item = &'a TestCase> {
        self.test_cases
            .iter()
            .filter(move |t| t.verifies(requirement_id))
    }
}

pub struct SpecTestGenerator {
    prd_path: PathBuf,
    output_dir: PathBuf,
    policy: PolicyConfig,
    parser: PrdParser,
}

impl SpecTestGenerator {
    /// The identifier store lives in `output_dir`, so IDs stay stable across runs
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(
        prd_path: P1,
        output_dir: P2,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            prd_path: prd_path.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            policy,
            parser: PrdParser::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn generate(&self) -> Result<GenerationResult> {
        let prd = self.parser.parse_file(&self.prd_path)?;

        fs::create_dir_all(&self.output_dir)?;
        let mut allocator = IdAllocator::open_with_policy(&self.output_dir, &self.policy)?;

        let mut result = GenerationResult {
            title: prd.title.clone(),
            goal: prd.goal.clone(),
            non_goals: prd.non_goals.clone(),
            open_questions: prd.open_questions.clone(),
            ..GenerationResult::default()
        };

        // Functional statements first, matching the order the impact analyzer compares in
        let ordered = prd
            .statements
            .iter()
            .filter(|s| s.kind == StatementKind::Functional)
            .chain(
                prd.statements
                    .iter()
                    .filter(|s| s.kind == StatementKind::NonFunctional),
            );

        for statement in ordered {
            let fingerprint = allocator.fingerprint(&statement.text);
            let id = allocator.requirement_id(&fingerprint)?;
            if result.requirements.iter().any(|r| r.id == id) {
                log::warn!("Skipping duplicate statement {}: {}", id, statement.text);
                continue;
            }
            let requirement = self.build_requirement(id, statement);

            let tests = self.build_tests(&mut allocator, &fingerprint, &requirement)?;
            result.test_cases.extend(tests);

            if let Some(question) = ambiguity_question(&requirement) {
                result.open_questions.push(question);
            }
            result.requirements.push(requirement);
        }

        allocator.close()?;

        log::info!(
            "Generated {} requirements and {} test cases from {}",
            result.requirements.len(),
            result.test_cases.len(),
            self.prd_path.display()
        );

        Ok(result)
    }

    fn build_requirement(&self, id: String, statement: &ParsedStatement) -> Requirement {
        let priority = self.policy.priority.classify(&statement.text);

        let feature_area = if statement.feature_area.is_empty()
            && statement.kind == StatementKind::NonFunctional
        {
            NON_FUNCTIONAL_AREA.to_string()
        } else {
            statement.feature_area.clone()
        };

        let acceptance_criteria = if statement.acceptance_criteria.is_empty() {
            vec![default_acceptance_criterion(&statement.text)]
        } else {
            statement.acceptance_criteria.clone()
        };

        Requirement::new(id, statement.text.clone(), priority)
            .with_acceptance_criteria(acceptance_criteria)
            .with_edge_cases(statement.edge_cases.clone())
            .with_feature_area(feature_area)
    }

    /// One unit test per acceptance criterion and edge case, plus one test
    /// per type the coverage policy requires at this priority
    fn build_tests(
        &self,
        allocator: &mut IdAllocator,
        req_fp: &Fingerprint,
        req: &Requirement,
    ) -> Result<Vec<TestCase>> {
        let mut tests = Vec::new();
        let preconditions = if req.feature_area.is_empty() {
            "The system is deployed with default configuration".to_string()
        } else {
            format!("{} is available", req.feature_area)
        };

        for (n, criterion) in req.acceptance_criteria.iter().enumerate() {
            let key = format!("{}:criterion:{}", req_fp, n + 1);
            let id = allocator.test_id(&Fingerprint::of_key(&key))?;

            let mut test = TestCase::new(
                id,
                format!("Verify {}", criterion),
                TestType::Unit,
                req.priority,
                vec![req.id.clone()],
            );
            test.preconditions = preconditions.clone();
            test.steps = vec![
                format!("Arrange the conditions described by {}", req.id),
                format!("Exercise: {}", criterion),
            ];
            test.expected = vec![criterion.clone()];
            tests.push(test);
        }

        for (n, edge) in req.edge_cases.iter().enumerate() {
            let key = format!("{}:edge:{}", req_fp, n + 1);
            let id = allocator.test_id(&Fingerprint::of_key(&key))?;

            let mut test = TestCase::new(
                id,
                format!("Handle edge case: {}", edge),
                TestType::Unit,
                req.priority,
                vec![req.id.clone()],
            );
            test.preconditions = preconditions.clone();
            test.steps = vec![format!("Trigger the edge case: {}", edge)];
            test.expected = vec![format!("{} is handled without violating {}", edge, req.id)];
            tests.push(test);
        }

        for (n, test_type) in self
            .policy
            .coverage
            .required_for(req.priority)
            .iter()
            .enumerate()
        {
            let key = format!("{}:required:{}:{}", req_fp, test_type.tag(), n + 1);
            let id = allocator.test_id(&Fingerprint::of_key(&key))?;

            let mut test = TestCase::new(
                id,
                format!("{} verification of {}", test_type, req.statement),
                *test_type,
                req.priority,
                vec![req.id.clone()],
            );
            test.preconditions = preconditions.clone();
            test.steps = type_steps(*test_type, &req.statement);
            test.expected = req.acceptance_criteria.clone();
            tests.push(test);
        }

        Ok(tests)
    }

    /// Writes the Markdown and JSON artifacts into the output directory
    pub fn write_artifacts(&self, result: &GenerationResult) -> Result<BTreeMap<String, PathBuf>> {
        export::write_all(result, &self.output_dir)
    }
}

/// Criterion used when a statement comes without any of its own
pub fn default_acceptance_criterion(statement: &str) -> String {
    format!("{} is demonstrably satisfied", statement)
}

fn type_steps(test_type: TestType, statement: &str) -> Vec<String> {
    match test_type {
        TestType::E2e => vec![
            "Start from a clean user session".to_string(),
            format!("Complete the user flow: {}", statement),
            "Observe the result through the user interface".to_string(),
        ],
        TestType::Integration => vec![
            "Start the dependent services".to_string(),
            format!("Exercise the integration behind: {}", statement),
        ],
        TestType::Performance => vec![
            "Apply the expected production load".to_string(),
            format!("Measure: {}", statement),
        ],
        TestType::Security => vec![
            "Attempt the flow with an unauthorized actor".to_string(),
            format!("Attempt to bypass: {}", statement),
        ],
        TestType::Unit => vec![format!("Exercise: {}", statement)],
    }
}

/// Ambiguous terms found in a statement, in `AMBIGUOUS_TERMS` order
pub fn ambiguous_terms(statement: &str) -> Vec<&'static str> {
    let words: Vec<String> = statement
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();

    AMBIGUOUS_TERMS
        .iter()
        .copied()
        .filter(|term| words.iter().any(|w| w == term))
        .collect()
}

fn ambiguity_question(req: &Requirement) -> Option<String> {
    let terms = ambiguous_terms(&req.statement);
    if terms.is_empty() {
        return None;
    }

    let quoted: Vec<String> = terms.iter().map(|t| format!("\"{}\"", t)).collect();
    Some(format!(
        "{}: what measurable criterion defines {}?",
        req.id,
        quoted.join(", ")
    ))
}
