use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Turn PRDs into traceable requirements and tests, and report coverage gaps and change impact"
)]
pub struct Cli {
    /// Policy file (defaults to $SPECTEST_POLICY, ./spectest.yaml, then the user config dir)
    #[clap(long, global = true)]
    pub policy: Option<PathBuf>,

    /// Show debug logging (RUST_LOG overrides)
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportSource {
    Jira,
    Linear,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFormat {
    Yaml,
    Sqlite,
}

#[derive(Subcommand, Debug)]
pub enum IdsCommand {
    /// Show the identifier store of a working directory
    Show {
        /// Working directory holding the identifier store
        #[clap(long, short = 'w', default_value = ".")]
        work_dir: PathBuf,

        /// Also list every fingerprint -> ID mapping
        #[clap(long)]
        mappings: bool,
    },

    /// Copy an identifier store into a new file of another format
    Migrate {
        /// Source store (.yaml or .db)
        from: PathBuf,

        /// Destination store (.yaml or .db), must hold no IDs yet
        to: PathBuf,

        /// Destination format, inferred from the extension when omitted
        #[clap(long, value_enum)]
        format: Option<StoreFormat>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Check a policy file for errors
    Validate {
        /// Policy YAML file
        file: PathBuf,
    },

    /// Print the effective policy and where it was loaded from
    Show,

    /// Write the default policy to a file
    Init {
        /// Destination file
        #[clap(default_value = "spectest.yaml")]
        file: PathBuf,

        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate requirements, test cases and traceability artifacts from a PRD
    Generate {
        /// PRD Markdown file
        prd: PathBuf,

        /// Output directory (also holds the identifier store)
        #[clap(long, short = 'o', default_value = "spec")]
        output: PathBuf,

        /// Also write Gherkin feature files
        #[clap(long)]
        gherkin: bool,
    },

    /// Analyze coverage gaps in requirement/test records
    Coverage {
        /// Records file (requirements.json)
        records: PathBuf,

        /// Directory for COVERAGE_REPORT.md
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Exit with an error when any gap is found
        #[clap(long)]
        strict: bool,
    },

    /// Compare two PRD versions and report change impact
    Impact {
        /// Baseline PRD
        baseline: PathBuf,

        /// Current PRD
        current: PathBuf,

        /// Records file whose test cases are checked for impact
        #[clap(long)]
        tests: Option<PathBuf>,

        /// Working directory holding the identifier store
        #[clap(long, short = 'w', default_value = ".")]
        work_dir: PathBuf,

        /// Directory for IMPACT_REPORT.md (defaults to the working directory)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Write Gherkin feature files from requirement/test records
    Gherkin {
        /// Records file (requirements.json)
        records: PathBuf,

        /// Output directory; files go to <output>/features
        #[clap(long, short = 'o', default_value = ".")]
        output: PathBuf,
    },

    /// Import requirements from an issue-tracker JSON export
    Import {
        /// Tracker the export comes from
        #[clap(value_enum)]
        source: ImportSource,

        /// Export file
        file: PathBuf,

        /// Working directory holding the identifier store
        #[clap(long, short = 'w', default_value = ".")]
        work_dir: PathBuf,

        /// Write the imported records to this file instead of printing them
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Inspect or migrate the identifier store
    Ids {
        #[clap(subcommand)]
        command: IdsCommand,
    },

    /// Inspect policy configuration
    Policy {
        #[clap(subcommand)]
        command: PolicyCommand,
    },
}
