// 🩺 Record Model - Demographic + Observation sources, merged patient records
//
// Source rows stay as raw text until the Candidate step, so a bad value in
// one row becomes a rejection for that identifier instead of a load error.

use crate::error::CoercionError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// IDENTIFIER
// ============================================================================

/// Join key shared by both source tables.
///
/// Range (100000-999999) is a validation rule, not a construction rule: an
/// out-of-range id still has to land somewhere in the outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(pub i64);

impl Identifier {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier(value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SOURCE RECORDS (immutable once read)
// ============================================================================

/// Row of the demographic table (persons.csv)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicRecord {
    pub id: Identifier,
    pub forename: Option<String>,
    pub surname: Option<String>,
    pub date_of_birth: Option<String>,
    pub sex: Option<String>,
}

impl DemographicRecord {
    pub fn new(id: i64) -> Self {
        DemographicRecord {
            id: Identifier(id),
            forename: None,
            surname: None,
            date_of_birth: None,
            sex: None,
        }
    }

    /// Builder pattern: add given + family name
    pub fn with_names(mut self, forename: &str, surname: &str) -> Self {
        self.forename = Some(forename.to_string());
        self.surname = Some(surname.to_string());
        self
    }

    /// Builder pattern: add date of birth (raw text)
    pub fn with_date_of_birth(mut self, date_of_birth: &str) -> Self {
        self.date_of_birth = Some(date_of_birth.to_string());
        self
    }

    /// Builder pattern: add sex code (raw text)
    pub fn with_sex(mut self, sex: &str) -> Self {
        self.sex = Some(sex.to_string());
        self
    }
}

/// Row of the observation table (medical.csv)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: Identifier,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub blood_pressure: Option<String>,
    pub cholesterol_level: Option<String>,
    pub notes: Option<String>,
}

impl ObservationRecord {
    pub fn new(id: i64) -> Self {
        ObservationRecord {
            id: Identifier(id),
            height: None,
            weight: None,
            blood_pressure: None,
            cholesterol_level: None,
            notes: None,
        }
    }

    /// Builder pattern: add height (cm) and weight (kg)
    pub fn with_measurements(mut self, height_cm: &str, weight_kg: &str) -> Self {
        self.height = Some(height_cm.to_string());
        self.weight = Some(weight_kg.to_string());
        self
    }

    pub fn with_blood_pressure(mut self, reading: &str) -> Self {
        self.blood_pressure = Some(reading.to_string());
        self
    }

    pub fn with_cholesterol(mut self, level: &str) -> Self {
        self.cholesterol_level = Some(level.to_string());
        self
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

/// Identifier-keyed tables. BTreeMap keeps every downstream walk ascending.
pub type DemographicTable = BTreeMap<Identifier, DemographicRecord>;
pub type ObservationTable = BTreeMap<Identifier, ObservationRecord>;

// ============================================================================
// CANDIDATE + PATIENT RECORDS
// ============================================================================

/// Joined, coerced record awaiting validation.
///
/// Missing text fields are empty strings here so the validator sees exactly
/// what the rules compare against.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    pub id: Identifier,
    pub forename: String,
    pub surname: String,
    pub date_of_birth: Option<NaiveDate>,
    pub sex: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<u32>,
    pub blood_pressure: String,
    pub cholesterol_level: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    /// Exact match on the single-letter code; no case folding.
    pub fn from_code(code: &str) -> Option<Sex> {
        match code {
            "M" => Some(Sex::Male),
            "F" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }
}

/// A candidate that passed every rule. Field order is the output column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    #[serde(rename = "ID")]
    pub id: Identifier,

    #[serde(rename = "FORENAME")]
    pub forename: String,

    #[serde(rename = "SURNAME")]
    pub surname: String,

    #[serde(rename = "DOB")]
    pub date_of_birth: Option<NaiveDate>,

    #[serde(rename = "SEX")]
    pub sex: Sex,

    #[serde(rename = "HEIGHT_CM")]
    pub height_cm: Option<f64>,

    #[serde(rename = "WEIGHT_KG")]
    pub weight_kg: Option<f64>,

    #[serde(rename = "BMI")]
    pub bmi: Option<u32>,

    #[serde(rename = "BP_LVL")]
    pub blood_pressure: String,

    #[serde(rename = "CHOL_LVL")]
    pub cholesterol_level: i64,

    #[serde(rename = "NOTES")]
    pub notes: Option<String>,
}

impl PatientRecord {
    /// Only the validator builds these, after every rule has passed.
    pub(crate) fn from_candidate(candidate: CandidateRecord, sex: Sex, cholesterol_level: i64) -> Self {
        PatientRecord {
            id: candidate.id,
            forename: candidate.forename,
            surname: candidate.surname,
            date_of_birth: candidate.date_of_birth,
            sex,
            height_cm: candidate.height_cm,
            weight_kg: candidate.weight_kg,
            bmi: candidate.bmi,
            blood_pressure: candidate.blood_pressure,
            cholesterol_level,
            notes: candidate.notes.filter(|n| !n.is_empty()),
        }
    }
}

// ============================================================================
// COERCION HELPERS
// ============================================================================

/// Parse an identifier cell. Integral decimals ("100001.0") are accepted.
pub fn parse_identifier(raw: &str) -> Result<Identifier, CoercionError> {
    parse_integer("ID", Some(raw))?
        .map(Identifier)
        .ok_or_else(|| CoercionError::NotAnInteger {
            field: "ID",
            value: raw.to_string(),
        })
}

/// Parse an optional numeric measurement. Absent or blank means "no value".
pub fn parse_measurement(field: &'static str, raw: Option<&str>) -> Result<Option<f64>, CoercionError> {
    let Some(text) = non_blank(raw) else {
        return Ok(None);
    };

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(CoercionError::NotANumber {
            field,
            value: text.to_string(),
        }),
    }
}

/// Parse an optional integer, accepting integral decimals like "250.0".
pub fn parse_integer(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, CoercionError> {
    let Some(text) = non_blank(raw) else {
        return Ok(None);
    };

    if let Ok(value) = text.parse::<i64>() {
        return Ok(Some(value));
    }

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Ok(Some(value as i64))
        }
        _ => Err(CoercionError::NotAnInteger {
            field,
            value: text.to_string(),
        }),
    }
}

/// Parse an optional ISO date (YYYY-MM-DD).
pub fn parse_date(field: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, CoercionError> {
    let Some(text) = non_blank(raw) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CoercionError::InvalidDate {
            field,
            value: text.to_string(),
        })
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// TESTS
// ============================================================================
