// ✅ Record Validator - fixed-order field rules, first failure wins
//
// Pure: no logging, no I/O. The orchestrator owns the audit trail.
//
// Rule order:
//   1. ID in [100000, 999999]
//   2. SEX is exactly M or F
//   3. BP_LVL is one of the accepted readings (exact string match)
//   4. CHOL_LVL in [0, 300]
//   5. NOTES absent/empty or one of the canned notes (exact match)

use crate::error::CoercionError;
use crate::records::{CandidateRecord, Identifier, PatientRecord, Sex};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const IDENTIFIER_RANGE: RangeInclusive<i64> = 100_000..=999_999;
pub const CHOLESTEROL_RANGE: RangeInclusive<i64> = 0..=300;

pub const DEFAULT_BLOOD_PRESSURE_LEVELS: [&str; 5] = ["120/80", "130/85", "140/90", "150/95", "110/70"];
pub const DEFAULT_NOTES: [&str; 3] = ["Needs follow-up", "Regular check-up", "Medication prescribed"];

// ============================================================================
// RULES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    IdentifierRange,
    Sex,
    BloodPressure,
    Cholesterol,
    Note,
}

impl Rule {
    /// Evaluation order
    pub const ORDER: [Rule; 5] = [
        Rule::IdentifierRange,
        Rule::Sex,
        Rule::BloodPressure,
        Rule::Cholesterol,
        Rule::Note,
    ];

    /// Column the rule guards
    pub fn field(&self) -> &'static str {
        match self {
            Rule::IdentifierRange => "ID",
            Rule::Sex => "SEX",
            Rule::BloodPressure => "BP_LVL",
            Rule::Cholesterol => "CHOL_LVL",
            Rule::Note => "NOTES",
        }
    }
}

/// Accepted enumerated values. Configurable because the accepted
/// blood-pressure set has differed between deployments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default = "default_blood_pressure_levels")]
    pub blood_pressure_levels: Vec<String>,

    #[serde(default = "default_notes")]
    pub notes: Vec<String>,
}

fn default_blood_pressure_levels() -> Vec<String> {
    DEFAULT_BLOOD_PRESSURE_LEVELS.iter().map(|s| s.to_string()).collect()
}

fn default_notes() -> Vec<String> {
    DEFAULT_NOTES.iter().map(|s| s.to_string()).collect()
}

impl Default for ValidationRules {
    fn default() -> Self {
        ValidationRules {
            blood_pressure_levels: default_blood_pressure_levels(),
            notes: default_notes(),
        }
    }
}

// ============================================================================
// VERDICT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// One of the five field rules failed
    FieldRule(Rule),
    /// A source field could not be read as its expected type
    Coercion { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub id: Identifier,
    pub kind: FailureKind,
    pub reason: String,
}

impl ValidationFailure {
    pub fn field_rule(id: Identifier, rule: Rule, reason: String) -> Self {
        ValidationFailure {
            id,
            kind: FailureKind::FieldRule(rule),
            reason,
        }
    }

    pub fn coercion(id: Identifier, error: &CoercionError) -> Self {
        ValidationFailure {
            id,
            kind: FailureKind::Coercion {
                field: error.field().to_string(),
            },
            reason: error.to_string(),
        }
    }

    pub fn rule(&self) -> Option<Rule> {
        match self.kind {
            FailureKind::FieldRule(rule) => Some(rule),
            FailureKind::Coercion { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Validated(PatientRecord),
    Rejected(ValidationFailure),
}

impl Verdict {
    pub fn is_validated(&self) -> bool {
        matches!(self, Verdict::Validated(_))
    }

    pub fn id(&self) -> Identifier {
        match self {
            Verdict::Validated(record) => record.id,
            Verdict::Rejected(failure) => failure.id,
        }
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct RecordValidator {
    rules: ValidationRules,
    note_message: String,
}

impl RecordValidator {
    pub fn new() -> Self {
        Self::with_rules(ValidationRules::default())
    }

    pub fn with_rules(rules: ValidationRules) -> Self {
        let note_message = note_message(&rules.notes);
        RecordValidator { rules, note_message }
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Human-readable reason reported when `rule` fails
    pub fn message(&self, rule: Rule) -> String {
        match rule {
            Rule::IdentifierRange => "ID must be a 6-digit number".to_string(),
            Rule::Sex => "SEX must be 'M' or 'F'".to_string(),
            Rule::BloodPressure => "BP_LVL format is not valid".to_string(),
            Rule::Cholesterol => format!(
                "CHOL_LVL must be between {} and {}",
                CHOLESTEROL_RANGE.start(),
                CHOLESTEROL_RANGE.end()
            ),
            Rule::Note => self.note_message.clone(),
        }
    }

    /// Validate one candidate; the first violated rule decides the reason.
    pub fn validate(&self, candidate: CandidateRecord) -> Verdict {
        match self.evaluate(&candidate) {
            Ok((sex, cholesterol_level)) => {
                Verdict::Validated(PatientRecord::from_candidate(candidate, sex, cholesterol_level))
            }
            Err(rule) => Verdict::Rejected(ValidationFailure::field_rule(
                candidate.id,
                rule,
                self.message(rule),
            )),
        }
    }

    /// Returns the typed values the checks proved, or the first failing rule.
    fn evaluate(&self, candidate: &CandidateRecord) -> Result<(Sex, i64), Rule> {
        if !IDENTIFIER_RANGE.contains(&candidate.id.value()) {
            return Err(Rule::IdentifierRange);
        }

        let sex = Sex::from_code(&candidate.sex).ok_or(Rule::Sex)?;

        if !self.is_known_blood_pressure(&candidate.blood_pressure) {
            return Err(Rule::BloodPressure);
        }

        let cholesterol_level = candidate
            .cholesterol_level
            .filter(|level| CHOLESTEROL_RANGE.contains(level))
            .ok_or(Rule::Cholesterol)?;

        if let Some(note) = candidate.notes.as_deref().filter(|n| !n.is_empty()) {
            if !self.is_known_note(note) {
                return Err(Rule::Note);
            }
        }

        Ok((sex, cholesterol_level))
    }

    fn is_known_blood_pressure(&self, reading: &str) -> bool {
        self.rules.blood_pressure_levels.iter().any(|level| level == reading)
    }

    fn is_known_note(&self, note: &str) -> bool {
        self.rules.notes.iter().any(|known| known == note)
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn note_message(notes: &[String]) -> String {
    let quoted: Vec<String> = notes.iter().map(|n| format!("'{}'", n)).collect();
    if quoted.is_empty() {
        "NOTES must be None".to_string()
    } else {
        format!("NOTES must be {}, or None", quoted.join(", "))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn create_test_candidate(id: i64) -> CandidateRecord {
        CandidateRecord {
            id: Identifier(id),
            forename: "Grace".to_string(),
            surname: "Moore".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1961, 7, 14),
            sex: "F".to_string(),
            height_cm: Some(165.0),
            weight_kg: Some(60.0),
            bmi: Some(22),
            blood_pressure: "120/80".to_string(),
            cholesterol_level: Some(190),
            notes: Some("Regular check-up".to_string()),
        }
    }

    fn rejected_rule(verdict: Verdict) -> Rule {
        match verdict {
            Verdict::Rejected(failure) => failure.rule().expect("field rule failure"),
            Verdict::Validated(record) => panic!("expected rejection, got {:?}", record),
        }
    }

    #[test]
    fn test_valid_candidate_passes_unchanged() {
        let validator = RecordValidator::new();
        let verdict = validator.validate(create_test_candidate(100001));

        let Verdict::Validated(record) = verdict else {
            panic!("expected validated record");
        };
        assert_eq!(record.id, Identifier(100001));
        assert_eq!(record.sex, Sex::Female);
        assert_eq!(record.bmi, Some(22));
        assert_eq!(record.cholesterol_level, 190);
        assert_eq!(record.notes.as_deref(), Some("Regular check-up"));
    }

    #[test]
    fn test_identifier_range_bounds() {
        let validator = RecordValidator::new();
        assert!(validator.validate(create_test_candidate(100000)).is_validated());
        assert!(validator.validate(create_test_candidate(999999)).is_validated());
        assert_eq!(rejected_rule(validator.validate(create_test_candidate(99999))), Rule::IdentifierRange);
        assert_eq!(rejected_rule(validator.validate(create_test_candidate(1000000))), Rule::IdentifierRange);
    }

    #[test]
    fn test_sex_must_be_exact() {
        let validator = RecordValidator::new();
        for bad in ["", "m", "X", "Male"] {
            let mut candidate = create_test_candidate(100001);
            candidate.sex = bad.to_string();
            assert_eq!(rejected_rule(validator.validate(candidate)), Rule::Sex);
        }
    }

    #[test]
    fn test_blood_pressure_exact_membership() {
        let validator = RecordValidator::new();

        let mut close = create_test_candidate(100001);
        close.blood_pressure = "120/85".to_string();
        assert_eq!(rejected_rule(validator.validate(close)), Rule::BloodPressure);

        let mut missing = create_test_candidate(100001);
        missing.blood_pressure = String::new();
        assert_eq!(rejected_rule(validator.validate(missing)), Rule::BloodPressure);

        let mut included = create_test_candidate(100001);
        included.blood_pressure = "110/70".to_string();
        assert!(validator.validate(included).is_validated());
    }

    #[test]
    fn test_blood_pressure_set_is_configurable() {
        let rules = ValidationRules {
            blood_pressure_levels: vec!["120/80".to_string(), "130/85".to_string()],
            ..ValidationRules::default()
        };
        let validator = RecordValidator::with_rules(rules);

        let mut candidate = create_test_candidate(100001);
        candidate.blood_pressure = "110/70".to_string();
        assert_eq!(rejected_rule(validator.validate(candidate)), Rule::BloodPressure);
    }

    #[test]
    fn test_cholesterol_range() {
        let validator = RecordValidator::new();

        for (level, ok) in [(Some(0), true), (Some(300), true), (Some(-1), false), (Some(305), false), (None, false)] {
            let mut candidate = create_test_candidate(100004);
            candidate.cholesterol_level = level;
            let verdict = validator.validate(candidate);
            if ok {
                assert!(verdict.is_validated(), "level {:?} should pass", level);
            } else {
                assert_eq!(rejected_rule(verdict), Rule::Cholesterol);
            }
        }
    }

    #[test]
    fn test_cholesterol_reason_text() {
        let validator = RecordValidator::new();
        let mut candidate = create_test_candidate(100004);
        candidate.cholesterol_level = Some(305);

        let Verdict::Rejected(failure) = validator.validate(candidate) else {
            panic!("expected rejection");
        };
        assert_eq!(failure.id, Identifier(100004));
        assert_eq!(failure.reason, "CHOL_LVL must be between 0 and 300");
    }

    #[test]
    fn test_notes_exact_or_absent() {
        let validator = RecordValidator::new();

        let mut wrong_case = create_test_candidate(100001);
        wrong_case.notes = Some("needs follow-up".to_string());
        assert_eq!(rejected_rule(validator.validate(wrong_case)), Rule::Note);

        let mut absent = create_test_candidate(100001);
        absent.notes = None;
        assert!(validator.validate(absent).is_validated());

        let mut empty = create_test_candidate(100001);
        empty.notes = Some(String::new());
        let Verdict::Validated(record) = validator.validate(empty) else {
            panic!("empty note should pass");
        };
        assert_eq!(record.notes, None);
    }

    #[test]
    fn test_note_reason_lists_canned_notes() {
        let validator = RecordValidator::new();
        assert_eq!(
            validator.message(Rule::Note),
            "NOTES must be 'Needs follow-up', 'Regular check-up', 'Medication prescribed', or None"
        );
    }

    #[test]
    fn test_short_circuit_reports_first_rule_only() {
        let validator = RecordValidator::new();
        let mut candidate = create_test_candidate(100001);
        candidate.sex = "U".to_string();
        candidate.cholesterol_level = Some(999);

        let Verdict::Rejected(failure) = validator.validate(candidate) else {
            panic!("expected rejection");
        };
        assert_eq!(failure.rule(), Some(Rule::Sex));
        assert_eq!(failure.reason, "SEX must be 'M' or 'F'");
    }

    #[test]
    fn test_rule_order_matches_evaluation() {
        // Break every rule; removing violations front to back must walk ORDER.
        let validator = RecordValidator::new();
        let mut candidate = create_test_candidate(42);
        candidate.sex = "?".to_string();
        candidate.blood_pressure = "1/1".to_string();
        candidate.cholesterol_level = None;
        candidate.notes = Some("irregular entry".to_string());

        let mut seen = Vec::new();
        loop {
            match validator.validate(candidate.clone()) {
                Verdict::Validated(_) => break,
                Verdict::Rejected(failure) => {
                    let rule = failure.rule().unwrap();
                    seen.push(rule);
                    match rule {
                        Rule::IdentifierRange => candidate.id = Identifier(100042),
                        Rule::Sex => candidate.sex = "M".to_string(),
                        Rule::BloodPressure => candidate.blood_pressure = "140/90".to_string(),
                        Rule::Cholesterol => candidate.cholesterol_level = Some(150),
                        Rule::Note => candidate.notes = None,
                    }
                }
            }
        }

        assert_eq!(seen, Rule::ORDER.to_vec());
    }

    #[test]
    fn test_coercion_failure_carries_field() {
        let error = CoercionError::NotANumber {
            field: "HEIGHT_CM",
            value: "tall".to_string(),
        };
        let failure = ValidationFailure::coercion(Identifier(100007), &error);

        assert_eq!(failure.rule(), None);
        assert_eq!(
            failure.kind,
            FailureKind::Coercion {
                field: "HEIGHT_CM".to_string()
            }
        );
        assert_eq!(failure.reason, "HEIGHT_CM could not be read as a number: 'tall'");
    }
}
