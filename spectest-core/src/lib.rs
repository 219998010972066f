pub mod allocator;
pub mod config;
pub mod coverage;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod generator;
pub mod gherkin;
pub mod impact;
pub mod importers;
pub mod models;
pub mod parser;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use allocator::IdAllocator;
pub use config::{
    global_policy_path, CoveragePolicy, FingerprintConfig, ImpactPolicy, PolicyConfig,
    PriorityPolicy, LOCAL_POLICY_FILE, POLICY_ENV_VAR,
};
pub use coverage::{
    CoverageAnalyzer, CoverageReport, Gap, GapType, RequirementCoverage, Severity,
    COVERAGE_REPORT_FILE,
};
pub use error::{Result, SpecTestError};
pub use fingerprint::{fingerprint, Fingerprint, Fingerprinter};
pub use generator::{GenerationResult, SpecTestGenerator};
pub use gherkin::{sanitize_filename, GherkinGenerator};
pub use impact::{
    Change, ChangeType, ImpactAnalyzer, ImpactReport, RiskLevel, IMPACT_REPORT_FILE,
};
pub use importers::{JiraImporter, LinearImporter};
pub use models::{ExistingTest, Priority, Requirement, TestCase, TestType, TraceRecords};
pub use parser::{DocumentParser, ParsedPrd, ParsedStatement, PrdParser, StatementKind};
pub use storage::Storage;
pub use store::{
    create_backend, migrate_store, open_in_dir, BackendType, IdCategory, IdState, IdStoreBackend,
    SqliteBackend, StoreStats, YamlBackend, SQLITE_STORE_FILE, YAML_STORE_FILE,
};
