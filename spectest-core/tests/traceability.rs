//! Cross-module scenarios: a PRD goes through generation, the records are
//! audited for coverage, and an edited PRD is compared against the original
//! using the IDs issued by the first run.

use std::fs;
use std::path::{Path, PathBuf};

use spectest_core::{
    ChangeType, CoverageAnalyzer, GapType, GherkinGenerator, IdAllocator, IdCategory,
    ImpactAnalyzer, PolicyConfig, Requirement, RiskLevel, SpecTestGenerator, TestType,
    TraceRecords, YAML_STORE_FILE,
};
use tempfile::TempDir;

fn ids(reqs: &[Requirement]) -> Vec<String> {
    reqs.iter().map(|r| r.id.clone()).collect()
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const PRD_V1: &str = "
# PRD: Test Feature

## Goal
Test ID stability

## Functional Requirements
1) Users can log in
2) Users can log out
";

const PRD_V2: &str = "
# PRD: Test Feature

## Goal
Test ID stability

## Functional Requirements
1) Users can log in
2) Users can log out
3) Users can reset their password
";

#[test]
fn ids_stable_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let prd = write(temp_dir.path(), "prd.md", PRD_V1);
    let output_dir = temp_dir.path().join("spec");

    let first = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();
    let second = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();

    assert_eq!(ids(&first.requirements), vec!["REQ-0001", "REQ-0002"]);
    assert_eq!(ids(&first.requirements), ids(&second.requirements));
    assert!(output_dir.join(YAML_STORE_FILE).exists());
}

#[test]
fn new_requirement_gets_new_id() {
    let temp_dir = TempDir::new().unwrap();
    let prd = temp_dir.path().join("prd.md");
    let output_dir = temp_dir.path().join("spec");

    fs::write(&prd, "# PRD: Test Feature\n\n## Functional Requirements\n1) First requirement\n").unwrap();
    let first = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();

    fs::write(
        &prd,
        "# PRD: Test Feature\n\n## Functional Requirements\n1) First requirement\n2) Second requirement\n",
    )
    .unwrap();
    let second = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();

    assert_eq!(second.requirements.len(), 2);
    assert_eq!(first.requirements[0].id, second.requirements[0].id);
    assert_eq!(second.requirements[1].id, "REQ-0002");
}

#[test]
fn removed_requirement_id_is_never_reused() {
    let temp_dir = TempDir::new().unwrap();
    let prd = temp_dir.path().join("prd.md");
    let output_dir = temp_dir.path().join("spec");

    fs::write(&prd, PRD_V1).unwrap();
    SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();

    fs::write(&prd, "# PRD\n\n## Functional Requirements\n1) Users can export reports\n").unwrap();
    let result = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default())
        .generate()
        .unwrap();

    assert_eq!(result.requirements[0].id, "REQ-0003");
}

#[test]
fn generated_records_drive_coverage_and_gherkin() {
    let temp_dir = TempDir::new().unwrap();
    let prd = write(
        temp_dir.path(),
        "prd.md",
        "# PRD: Accounts\n\n## Functional Requirements\n### Authentication\n1) Users must log in\n2) Users can log out\n",
    );
    let output_dir = temp_dir.path().join("spec");

    let generator = SpecTestGenerator::new(&prd, &output_dir, PolicyConfig::default());
    let result = generator.generate().unwrap();
    let artifacts = generator.write_artifacts(&result).unwrap();

    // Records survive the JSON round trip through requirements.json
    let mut records = TraceRecords::load(&artifacts["requirements.json"]).unwrap();
    let report = CoverageAnalyzer::new(&records.requirements, &records.test_cases).analyze();
    assert_eq!(report.coverage_percentage, 100.0);

    // Dropping the E2E test of the P0 requirement opens a type gap
    records
        .test_cases
        .retain(|t| t.test_type != TestType::E2e);
    let report = CoverageAnalyzer::new(&records.requirements, &records.test_cases).analyze();
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].gap_type, GapType::TypeMissing);
    assert_eq!(report.gaps[0].requirement_id, "REQ-0001");

    let features = GherkinGenerator::from_records(&records, &output_dir)
        .generate()
        .unwrap();
    let content = fs::read_to_string(&features["Authentication"]).unwrap();
    assert!(content.contains("Feature: Authentication"));
    assert!(content.contains("@REQ-0001"));
}

#[test]
fn impact_uses_ids_from_generation() {
    let temp_dir = TempDir::new().unwrap();
    let v1 = write(temp_dir.path(), "v1.md", PRD_V1);
    let v2 = write(
        temp_dir.path(),
        "v2.md",
        "# PRD: Test Feature\n\n## Functional Requirements\n1) Users can log in\n",
    );
    let work_dir = temp_dir.path().join("spec");

    let result = SpecTestGenerator::new(&v1, &work_dir, PolicyConfig::default())
        .generate()
        .unwrap();
    let logout_tests: Vec<String> = result
        .test_cases
        .iter()
        .filter(|t| t.verifies("REQ-0002"))
        .map(|t| t.id.clone())
        .collect();
    assert!(!logout_tests.is_empty());

    let existing = result.records().existing_tests();
    let mut analyzer = ImpactAnalyzer::new(&work_dir).unwrap();
    let report = analyzer.compare(&v1, &v2, Some(&existing)).unwrap();

    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].change_type, ChangeType::Removed);
    assert_eq!(report.changes[0].requirement_id, "REQ-0002");
    assert_eq!(report.risk_level, RiskLevel::High);
    assert_eq!(report.affected_tests, logout_tests);
}

#[test]
fn impact_idempotence_and_escalation() {
    let temp_dir = TempDir::new().unwrap();
    let full = write(
        temp_dir.path(),
        "full.md",
        "## Functional Requirements\n1) Requirement alpha\n2) Requirement beta\n3) Requirement gamma\n4) Requirement delta\n",
    );
    let reduced = write(
        temp_dir.path(),
        "reduced.md",
        "## Functional Requirements\n1) Requirement alpha\n",
    );

    let mut analyzer = ImpactAnalyzer::new(temp_dir.path()).unwrap();

    let same = analyzer.compare(&full, &full, None).unwrap();
    assert!(same.changes.is_empty());
    assert_eq!(same.risk_level, RiskLevel::Low);

    let shrunk = analyzer.compare(&full, &reduced, None).unwrap();
    assert_eq!(shrunk.count(ChangeType::Removed), 3);
    assert_eq!(shrunk.risk_level, RiskLevel::Critical);

    let grown = analyzer.compare(&reduced, &full, None).unwrap();
    assert_eq!(grown.count(ChangeType::Added), 3);
    assert_eq!(grown.risk_level, RiskLevel::Medium);

    // IDs issued during the first comparison are reused by the second
    assert_eq!(
        shrunk
            .changes
            .iter()
            .map(|c| c.requirement_id.clone())
            .collect::<Vec<_>>(),
        grown
            .changes
            .iter()
            .map(|c| c.requirement_id.clone())
            .collect::<Vec<_>>()
    );
}

#[test]
fn impact_report_written_to_output_dir() {
    let temp_dir = TempDir::new().unwrap();
    let v1 = write(temp_dir.path(), "v1.md", PRD_V1);
    let v2 = write(temp_dir.path(), "v2.md", PRD_V2);
    let reports = temp_dir.path().join("reports");

    let mut analyzer = ImpactAnalyzer::new(temp_dir.path())
        .unwrap()
        .with_output_dir(&reports);
    let path = analyzer.write_report(&v1, &v2).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("# Change Impact Report"));
    assert!(content.contains("**Risk Level:** MEDIUM"));
    assert!(content.contains("Users can reset their password"));
}

#[test]
fn custom_prefixes_apply_to_new_ids_only() {
    let temp_dir = TempDir::new().unwrap();

    let mut allocator = IdAllocator::open(temp_dir.path()).unwrap();
    assert_eq!(allocator.requirement_id_for("Users can log in").unwrap(), "REQ-0001");
    allocator.close().unwrap();

    let policy = PolicyConfig {
        req_prefix: "SPEC".to_string(),
        test_prefix: "TC".to_string(),
        ..PolicyConfig::default()
    };
    let mut allocator = IdAllocator::open_with_policy(temp_dir.path(), &policy).unwrap();
    assert_eq!(allocator.requirement_id_for("Users can log in").unwrap(), "REQ-0001");
    assert_eq!(allocator.requirement_id_for("Users can log out").unwrap(), "SPEC-0002");
    assert_eq!(allocator.issued(IdCategory::Requirement), 2);
}
