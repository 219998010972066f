mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::{ColoredString, Colorize};
use std::path::Path;

use spectest_core::fingerprint::prefix_chars;
use spectest_core::{
    create_backend, migrate_store, open_in_dir, BackendType, ChangeType, CoverageAnalyzer,
    ExistingTest, GherkinGenerator, IdAllocator, IdCategory, ImpactAnalyzer, JiraImporter,
    LinearImporter, PolicyConfig, Priority, RiskLevel, Severity, SpecTestGenerator, TraceRecords,
};

use crate::cli::{Cli, Command, IdsCommand, ImportSource, PolicyCommand, StoreFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Policy commands work on files directly and must not fail on a broken default policy
    if let Command::Policy { command } = &cli.command {
        return run_policy_command(command, cli.policy.as_deref());
    }

    let (policy, policy_path) =
        PolicyConfig::discover(cli.policy.as_deref()).context("Failed to load policy")?;
    if let Some(path) = &policy_path {
        log::debug!("Using policy {}", path.display());
    }

    match &cli.command {
        Command::Generate {
            prd,
            output,
            gherkin,
        } => generate(prd, output, *gherkin, &policy),
        Command::Coverage {
            records,
            output,
            strict,
        } => coverage(records, output.as_deref(), *strict, &policy),
        Command::Impact {
            baseline,
            current,
            tests,
            work_dir,
            output,
        } => impact(baseline, current, tests.as_deref(), work_dir, output.as_deref(), &policy),
        Command::Gherkin { records, output } => gherkin(records, output),
        Command::Import {
            source,
            file,
            work_dir,
            output,
        } => import(*source, file, work_dir, output.as_deref(), &policy),
        Command::Ids { command } => match command {
            IdsCommand::Show { work_dir, mappings } => show_ids(work_dir, *mappings),
            IdsCommand::Migrate { from, to, format } => migrate_ids(from, to, *format),
        },
        Command::Policy { .. } => Ok(()),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::P0 => "P0".red(),
        Priority::P1 => "P1".yellow(),
        Priority::P2 => "P2".green(),
    }
}

fn risk_label(risk: RiskLevel) -> ColoredString {
    let text = risk.to_string();
    match risk {
        RiskLevel::Low => text.green(),
        RiskLevel::Medium => text.yellow(),
        RiskLevel::High => text.red(),
        RiskLevel::Critical => text.red().bold(),
    }
}

fn generate(prd: &Path, output: &Path, with_gherkin: bool, policy: &PolicyConfig) -> Result<()> {
    let generator = SpecTestGenerator::new(prd, output, policy.clone());
    let result = generator
        .generate()
        .with_context(|| format!("Failed to generate from {}", prd.display()))?;

    println!("{}", format!("Generated artifacts for {}", result.title).green());
    println!("  Requirements:   {}", result.requirements.len());
    println!("  Test cases:     {}", result.test_cases.len());
    println!("  Open questions: {}", result.open_questions.len());

    let artifacts = generator
        .write_artifacts(&result)
        .context("Failed to write artifacts")?;
    for (name, path) in &artifacts {
        println!("  {:<18} {}", name, path.display());
    }

    if with_gherkin {
        let features = GherkinGenerator::new(&result.requirements, &result.test_cases, output)
            .generate()
            .context("Failed to write feature files")?;
        for (area, path) in &features {
            println!("  {:<18} {}", area, path.display());
        }
    }

    let report = CoverageAnalyzer::new(&result.requirements, &result.test_cases)
        .with_policy(policy.coverage.clone())
        .analyze();
    println!("  Coverage:       {:.1}%", report.coverage_percentage);

    Ok(())
}

fn coverage(records: &Path, output: Option<&Path>, strict: bool, policy: &PolicyConfig) -> Result<()> {
    let records = TraceRecords::load(records)
        .with_context(|| format!("Failed to read records from {}", records.display()))?;

    let analyzer = CoverageAnalyzer::new(&records.requirements, &records.test_cases)
        .with_policy(policy.coverage.clone());
    let report = analyzer.analyze();

    println!(
        "Coverage: {} ({}/{} requirements)",
        format!("{:.1}%", report.coverage_percentage).bold(),
        report.covered_requirements,
        report.total_requirements
    );

    if report.gaps.is_empty() {
        println!("{}", "No coverage gaps found.".green());
    } else {
        println!("{}", format!("{} gaps:", report.gaps.len()).yellow());
        for gap in &report.gaps {
            let severity = match gap.severity {
                Severity::Critical => gap.severity.to_string().red().bold(),
                Severity::High => gap.severity.to_string().red(),
                Severity::Medium => gap.severity.to_string().yellow(),
                Severity::Low => gap.severity.to_string().normal(),
            };
            println!("  [{}] {}", severity, gap.description);
        }
    }

    if let Some(dir) = output {
        let path = report.write_to(dir).context("Failed to write coverage report")?;
        println!("Report: {}", path.display());
    }

    if strict && !report.gaps.is_empty() {
        bail!("{} coverage gaps found", report.gaps.len());
    }

    Ok(())
}

fn impact(
    baseline: &Path,
    current: &Path,
    tests: Option<&Path>,
    work_dir: &Path,
    output: Option<&Path>,
    policy: &PolicyConfig,
) -> Result<()> {
    let existing: Option<Vec<ExistingTest>> = match tests {
        Some(path) => Some(
            TraceRecords::load(path)
                .with_context(|| format!("Failed to read test records from {}", path.display()))?
                .existing_tests(),
        ),
        None => None,
    };

    let mut analyzer = ImpactAnalyzer::with_policy(work_dir, policy)
        .with_context(|| format!("Failed to open identifier store in {}", work_dir.display()))?;
    if let Some(dir) = output {
        analyzer = analyzer.with_output_dir(dir);
    }

    let report = analyzer
        .compare(baseline, current, existing.as_deref())
        .context("Failed to compare documents")?;

    println!("Risk level: {}", risk_label(report.risk_level));
    if report.changes.is_empty() {
        println!("{}", "No changes detected.".green());
    }
    for change in &report.changes {
        let text = change
            .new_value
            .as_deref()
            .or(change.old_value.as_deref())
            .unwrap_or_default();
        let kind = match change.change_type {
            ChangeType::Added => "+".green(),
            ChangeType::Removed => "-".red(),
            ChangeType::Modified => "~".yellow(),
        };
        println!("  {} {} {}", kind, change.requirement_id.bold(), text);
    }

    if !report.affected_tests.is_empty() {
        println!("Affected tests: {}", report.affected_tests.join(", ").yellow());
    }

    let path = report
        .write_to(analyzer.output_dir())
        .context("Failed to write impact report")?;
    println!("Report: {}", path.display());

    Ok(())
}

fn gherkin(records: &Path, output: &Path) -> Result<()> {
    let records = TraceRecords::load(records)
        .with_context(|| format!("Failed to read records from {}", records.display()))?;

    let features = GherkinGenerator::from_records(&records, output)
        .generate()
        .context("Failed to write feature files")?;

    println!("{}", format!("Wrote {} feature files", features.len()).green());
    for (area, path) in &features {
        println!("  {:<20} {}", area, path.display());
    }

    Ok(())
}

fn import(
    source: ImportSource,
    file: &Path,
    work_dir: &Path,
    output: Option<&Path>,
    policy: &PolicyConfig,
) -> Result<()> {
    let mut allocator = IdAllocator::open_with_policy(work_dir, policy)
        .with_context(|| format!("Failed to open identifier store in {}", work_dir.display()))?;

    let requirements = match source {
        ImportSource::Jira => JiraImporter::new(&mut allocator).import_from_file(file),
        ImportSource::Linear => LinearImporter::new(&mut allocator).import_from_file(file),
    }
    .with_context(|| format!("Failed to import {}", file.display()))?;
    allocator.close()?;

    let records = TraceRecords::new(requirements, Vec::new());
    match output {
        Some(path) => {
            records
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{}",
                format!("Imported {} requirements", records.requirements.len()).green()
            );
            for req in &records.requirements {
                println!("  {} {} {}", req.id.bold(), priority_label(req.priority), req.statement);
            }
            println!("Records: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&records)?),
    }

    Ok(())
}

fn show_ids(work_dir: &Path, mappings: bool) -> Result<()> {
    let backend = open_in_dir(work_dir)?;
    if !backend.exists() {
        println!(
            "{}",
            format!("No identifier store in {}", work_dir.display()).yellow()
        );
        return Ok(());
    }

    let stats = backend
        .stats()
        .with_context(|| format!("Failed to read {}", backend.path().display()))?;

    println!("Store:        {} ({})", backend.path().display(), stats.backend_type);
    println!(
        "Requirements: {} issued, next #{}",
        stats.requirement_ids, stats.next_requirement
    );
    println!("Tests:        {} issued, next #{}", stats.test_ids, stats.next_test);

    if mappings {
        let state = backend.load()?;
        for category in IdCategory::all() {
            let mut entries: Vec<(&String, &String)> =
                state.category(*category).mappings.iter().collect();
            entries.sort_by(|a, b| a.1.cmp(b.1));

            println!("\n{}:", category.to_string().green());
            for (fingerprint, id) in entries {
                println!("  {:<12} {}", id, prefix_chars(fingerprint, 16));
            }
        }
    }

    Ok(())
}

fn migrate_ids(from: &Path, to: &Path, format: Option<StoreFormat>) -> Result<()> {
    if !from.exists() {
        bail!("Source store {} does not exist", from.display());
    }

    let source = create_backend(from, None)?;
    let target_type = format.map(|f| match f {
        StoreFormat::Yaml => BackendType::Yaml,
        StoreFormat::Sqlite => BackendType::Sqlite,
    });
    let target = create_backend(to, target_type)?;

    let count = migrate_store(source.as_ref(), target.as_ref()).with_context(|| {
        format!("Failed to migrate {} to {}", from.display(), to.display())
    })?;

    println!(
        "{}",
        format!(
            "Migrated {} mappings from {} ({}) to {} ({})",
            count,
            from.display(),
            source.backend_type(),
            to.display(),
            target.backend_type()
        )
        .green()
    );
    Ok(())
}

fn run_policy_command(command: &PolicyCommand, explicit: Option<&Path>) -> Result<()> {
    match command {
        PolicyCommand::Validate { file } => {
            match PolicyConfig::load(file) {
                Ok(_) => {
                    println!("{}", format!("{} is valid", file.display()).green());
                    Ok(())
                }
                Err(e) => {
                    println!("{}", format!("{} is invalid", file.display()).red());
                    Err(e.into())
                }
            }
        }
        PolicyCommand::Show => {
            let (policy, path) = PolicyConfig::discover(explicit).context("Failed to load policy")?;
            match path {
                Some(path) => println!("# Loaded from {}", path.display()),
                None => println!("# Built-in defaults"),
            }
            print!("{}", serde_yaml::to_string(&policy)?);
            Ok(())
        }
        PolicyCommand::Init { file, force } => {
            if file.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", file.display());
            }
            PolicyConfig::default().save(file)?;
            println!("{}", format!("Wrote default policy to {}", file.display()).green());
            Ok(())
        }
    }
}
