// Patient Merge - Core Library
// Merge-validate-triage of demographic + medical-observation tables

pub mod records;
pub mod error;
pub mod bmi;            // Derivation: body-mass index
pub mod validator;      // Field rules, first failure wins
pub mod reconciliation; // Matched / unmatched identifier partition
pub mod pipeline;       // Orchestrator: every identifier → one output
pub mod clock;
pub mod loader;         // CSV source tables
pub mod sink;           // CSV / in-memory outputs
pub mod config;
pub mod digest;
pub mod audit;          // Exhaustiveness / disjointness check

// Re-export commonly used types
pub use records::{
    CandidateRecord, DemographicRecord, DemographicTable, Identifier,
    ObservationRecord, ObservationTable, PatientRecord, Sex,
};
pub use error::CoercionError;
pub use bmi::derive_bmi;
pub use validator::{
    FailureKind, RecordValidator, Rule, ValidationFailure, ValidationRules, Verdict,
};
pub use reconciliation::{
    ReconciliationEngine, ReconciliationReport, SourceTable, UnmatchedIdentifier,
};
pub use pipeline::{
    build_candidate, FailureEntry, Outcome, Pipeline, PipelineReport, Triage,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use loader::{load_demographics, load_observations, read_demographics, read_observations};
pub use sink::{CsvRecord, CsvSink, OutputSink, Sinks};
pub use config::{InputPaths, OutputPaths, PipelineConfig};
pub use digest::hash_data;
pub use audit::{check_partition, read_identifiers, PartitionCheck};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
