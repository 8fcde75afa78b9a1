// 🏭 Pipeline Orchestrator - Reconcile → Candidate → BMI → Validate → route
//
// Every identifier in (demographic ∪ observation) ends in exactly one of:
//   validated  - PatientRecord
//   unmatched  - present in only one table
//   rejected   - field rule or coercion failure, with reason + timestamp
//
// A bad record never aborts the run; only sink failures do.

use crate::bmi::derive_bmi;
use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::digest::hash_data;
use crate::error::CoercionError;
use crate::reconciliation::{ReconciliationEngine, UnmatchedIdentifier};
use crate::records::{
    parse_date, parse_integer, parse_measurement, CandidateRecord, DemographicRecord, DemographicTable, Identifier,
    ObservationRecord, ObservationTable, PatientRecord,
};
use crate::sink::Sinks;
use crate::validator::{RecordValidator, ValidationFailure, ValidationRules, Verdict};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

// ============================================================================
// OUTCOMES
// ============================================================================

/// A rejection as it is written to the failure log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub failure: ValidationFailure,
    pub observed_at: DateTime<Utc>,
}

/// Terminal state of one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Validated(PatientRecord),
    Unmatched(UnmatchedIdentifier),
    Rejected(FailureEntry),
}

impl Outcome {
    pub fn id(&self) -> Identifier {
        match self {
            Outcome::Validated(record) => record.id,
            Outcome::Unmatched(unmatched) => unmatched.id,
            Outcome::Rejected(entry) => entry.failure.id,
        }
    }
}

/// The three disjoint output collections, each in ascending identifier order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triage {
    pub validated: Vec<PatientRecord>,
    pub unmatched: Vec<UnmatchedIdentifier>,
    pub rejected: Vec<FailureEntry>,
}

impl Triage {
    fn push(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Validated(record) => self.validated.push(record),
            Outcome::Unmatched(unmatched) => self.unmatched.push(unmatched),
            Outcome::Rejected(entry) => self.rejected.push(entry),
        }
    }

    pub fn total(&self) -> usize {
        self.validated.len() + self.unmatched.len() + self.rejected.len()
    }

    pub fn validated_ids(&self) -> Vec<Identifier> {
        self.validated.iter().map(|r| r.id).collect()
    }

    pub fn unmatched_ids(&self) -> Vec<Identifier> {
        self.unmatched.iter().map(|u| u.id).collect()
    }

    pub fn rejected_ids(&self) -> Vec<Identifier> {
        self.rejected.iter().map(|e| e.failure.id).collect()
    }

    /// SHA-256 over the three outputs, timestamps excluded.
    /// Identical inputs and rules always give the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut lines = Vec::with_capacity(self.total());

        for record in &self.validated {
            // PatientRecord serialization cannot fail: plain fields only
            let row = serde_json::to_string(record).unwrap_or_default();
            lines.push(format!("V|{}", row));
        }
        for unmatched in &self.unmatched {
            lines.push(format!("U|{}", unmatched.id));
        }
        for entry in &self.rejected {
            lines.push(format!("R|{}|{}", entry.failure.id, entry.failure.reason));
        }

        hash_data(&lines.join("\n"))
    }
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub total_identifiers: usize,
    pub validated_count: usize,
    pub unmatched_count: usize,
    pub rejected_count: usize,
    pub fingerprint: String,
}

impl PipelineReport {
    fn new(started_at: DateTime<Utc>, triage: &Triage) -> Self {
        PipelineReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            total_identifiers: triage.total(),
            validated_count: triage.validated.len(),
            unmatched_count: triage.unmatched.len(),
            rejected_count: triage.rejected.len(),
            fingerprint: triage.fingerprint(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Run {}: {} identifiers → {} validated, {} unmatched, {} rejected (fingerprint {})",
            self.run_id,
            self.total_identifiers,
            self.validated_count,
            self.unmatched_count,
            self.rejected_count,
            &self.fingerprint[..12.min(self.fingerprint.len())]
        )
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline<C: Clock = SystemClock> {
    validator: RecordValidator,
    clock: C,
    parallel: bool,
}

impl Pipeline<SystemClock> {
    /// Default rules, wall clock, parallel evaluation
    pub fn new() -> Self {
        Pipeline {
            validator: RecordValidator::new(),
            clock: SystemClock,
            parallel: true,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Pipeline::new()
            .with_rules(config.rules.clone())
            .with_parallelism(config.parallel)
    }
}

impl Default for Pipeline<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Pipeline<C> {
    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.validator = RecordValidator::with_rules(rules);
        self
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_clock<D: Clock>(self, clock: D) -> Pipeline<D> {
        Pipeline {
            validator: self.validator,
            clock,
            parallel: self.parallel,
        }
    }

    pub fn validator(&self) -> &RecordValidator {
        &self.validator
    }

    /// Route every identifier in either table to exactly one output
    pub fn triage(&self, demographics: &DemographicTable, observations: &ObservationTable) -> Triage {
        let reconciliation = ReconciliationEngine::reconcile_tables(demographics, observations);
        debug!("{}", reconciliation.summary());

        let assess = |id: &Identifier| self.assess(*id, demographics, observations);
        let assessed: Vec<Outcome> = if self.parallel {
            reconciliation.matched.par_iter().map(assess).collect()
        } else {
            reconciliation.matched.iter().map(assess).collect()
        };

        let mut triage = Triage::default();
        for unmatched in reconciliation.unmatched {
            triage.push(Outcome::Unmatched(unmatched));
        }
        for outcome in assessed {
            triage.push(outcome);
        }

        triage
    }

    /// Triage, then write each collection to its sink
    pub fn run(
        &self,
        demographics: &DemographicTable,
        observations: &ObservationTable,
        sinks: Sinks<'_>,
    ) -> Result<PipelineReport> {
        let started_at = self.clock.now();
        let triage = self.triage(demographics, observations);

        for record in &triage.validated {
            sinks.validated.write(record).context("Failed to write validated record")?;
        }
        for unmatched in &triage.unmatched {
            sinks.unmatched.write(unmatched).context("Failed to write unmatched identifier")?;
        }
        for entry in &triage.rejected {
            sinks.failures.write(entry).context("Failed to write validation failure")?;
        }

        sinks.validated.finish().context("Failed to finish validated output")?;
        sinks.unmatched.finish().context("Failed to finish unmatched output")?;
        sinks.failures.finish().context("Failed to finish failure output")?;

        let report = PipelineReport::new(started_at, &triage);
        info!(
            run_id = %report.run_id,
            validated = report.validated_count,
            unmatched = report.unmatched_count,
            rejected = report.rejected_count,
            "pipeline run complete"
        );

        Ok(report)
    }

    /// Candidate → Validated | Rejected for one matched identifier
    fn assess(&self, id: Identifier, demographics: &DemographicTable, observations: &ObservationTable) -> Outcome {
        let candidate = match (demographics.get(&id), observations.get(&id)) {
            (Some(person), Some(observation)) => build_candidate(person, observation),
            (None, _) => Err(CoercionError::MissingSource {
                table: "demographic",
            }),
            (_, None) => Err(CoercionError::MissingSource {
                table: "observation",
            }),
        };

        let verdict = match candidate {
            Ok(candidate) => self.validator.validate(candidate),
            Err(error) => Verdict::Rejected(ValidationFailure::coercion(id, &error)),
        };

        match verdict {
            Verdict::Validated(record) => Outcome::Validated(record),
            Verdict::Rejected(failure) => {
                debug!(id = %failure.id, reason = %failure.reason, "record rejected");
                Outcome::Rejected(FailureEntry {
                    failure,
                    observed_at: self.clock.now(),
                })
            }
        }
    }
}

/// Join one demographic row with one observation row and derive BMI.
///
/// Non-positive measurements are dropped to "no value" so that a validated
/// record never carries height or weight <= 0.
pub fn build_candidate(
    person: &DemographicRecord,
    observation: &ObservationRecord,
) -> Result<CandidateRecord, CoercionError> {
    let id = person.id;
    let height_cm = positive_or_absent(id, "HEIGHT_CM", parse_measurement("HEIGHT_CM", observation.height.as_deref())?);
    let weight_kg = positive_or_absent(id, "WEIGHT_KG", parse_measurement("WEIGHT_KG", observation.weight.as_deref())?);

    Ok(CandidateRecord {
        id,
        forename: person.forename.clone().unwrap_or_default(),
        surname: person.surname.clone().unwrap_or_default(),
        date_of_birth: parse_date("DOB", person.date_of_birth.as_deref())?,
        sex: person.sex.clone().unwrap_or_default(),
        height_cm,
        weight_kg,
        bmi: derive_bmi(weight_kg, height_cm),
        blood_pressure: observation.blood_pressure.clone().unwrap_or_default(),
        cholesterol_level: parse_integer("CHOL_LVL", observation.cholesterol_level.as_deref())?,
        notes: observation.notes.clone(),
    })
}

fn positive_or_absent(id: Identifier, field: &str, value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v <= 0.0 => {
            warn!(%id, field, value = v, "non-positive measurement treated as absent");
            None
        }
        other => other,
    }
}

// ============================================================================
// TESTS
// ============================================================================
