// 📥 Source Loader - persons.csv + medical.csv → identifier-keyed tables
//
// Only the identifier is typed here. Every other cell stays raw text (empty
// cells become None) so coercion errors land on one record, not the load.
//
// persons.csv: id,forename,surname,date_of_birth,sex
// medical.csv: id,age,height,weight,blood_pressure,cholestrol_lvl,Notes

use crate::records::{parse_identifier, DemographicRecord, DemographicTable, Identifier, ObservationRecord, ObservationTable};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct PersonRow {
    #[serde(alias = "ID")]
    id: String,
    #[serde(default)]
    forename: Option<String>,
    #[serde(default)]
    surname: Option<String>,
    #[serde(default)]
    date_of_birth: Option<String>,
    #[serde(default)]
    sex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MedicalRow {
    #[serde(alias = "ID")]
    id: String,
    #[serde(default)]
    height: Option<String>,
    #[serde(default)]
    weight: Option<String>,
    #[serde(default)]
    blood_pressure: Option<String>,
    // Source header is misspelled; accept the correct spelling too
    #[serde(default, rename = "cholestrol_lvl", alias = "cholesterol_lvl")]
    cholesterol_level: Option<String>,
    #[serde(default, rename = "Notes", alias = "notes")]
    notes: Option<String>,
}

// ============================================================================
// DEMOGRAPHICS
// ============================================================================

pub fn load_demographics(path: &Path) -> Result<DemographicTable> {
    let file = File::open(path).with_context(|| format!("Failed to open demographic table: {}", path.display()))?;
    read_demographics(file, &path.display().to_string())
}

pub fn read_demographics<R: Read>(reader: R, source: &str) -> Result<DemographicTable> {
    let table = read_table(reader, source, |id, row: PersonRow| DemographicRecord {
        id,
        forename: row.forename,
        surname: row.surname,
        date_of_birth: row.date_of_birth,
        sex: row.sex,
    })?;

    info!(rows = table.len(), source, "loaded demographic table");
    Ok(table)
}

// ============================================================================
// OBSERVATIONS
// ============================================================================

pub fn load_observations(path: &Path) -> Result<ObservationTable> {
    let file = File::open(path).with_context(|| format!("Failed to open observation table: {}", path.display()))?;
    read_observations(file, &path.display().to_string())
}

pub fn read_observations<R: Read>(reader: R, source: &str) -> Result<ObservationTable> {
    let table = read_table(reader, source, |id, row: MedicalRow| ObservationRecord {
        id,
        height: row.height,
        weight: row.weight,
        blood_pressure: row.blood_pressure,
        cholesterol_level: row.cholesterol_level,
        notes: row.notes,
    })?;

    info!(rows = table.len(), source, "loaded observation table");
    Ok(table)
}

// ============================================================================
// SHARED
// ============================================================================

fn read_table<R, Row, Rec, F>(reader: R, source: &str, build: F) -> Result<BTreeMap<Identifier, Rec>>
where
    R: Read,
    Row: DeserializeOwned + HasRawId,
    F: Fn(Identifier, Row) -> Rec,
{
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
    let mut table = BTreeMap::new();

    for (line_num, result) in rdr.deserialize::<Row>().enumerate() {
        let line = line_num + 2;
        let row = result.with_context(|| format!("Failed to parse CSV line {} in {}", line, source))?;
        let id = parse_identifier(row.raw_id())
            .with_context(|| format!("Invalid identifier on line {} in {}", line, source))?;

        if table.insert(id, build(id, row)).is_some() {
            bail!("Identifier {} appears more than once in {} (line {})", id, source, line);
        }
    }

    Ok(table)
}

trait HasRawId {
    fn raw_id(&self) -> &str;
}

impl HasRawId for PersonRow {
    fn raw_id(&self) -> &str {
        &self.id
    }
}

impl HasRawId for MedicalRow {
    fn raw_id(&self) -> &str {
        &self.id
    }
}

// ============================================================================
// TESTS
// ============================================================================
