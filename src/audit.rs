// 🧾 Partition Audit - every input identifier in exactly one output
//
// Works on bare identifier lists so it can check an in-memory Triage or
// the three CSV files a previous run left on disk.

use crate::records::{parse_identifier, Identifier};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCheck {
    /// Distinct identifiers across both inputs
    pub input_count: usize,

    /// Input identifiers absent from every output
    pub missing: Vec<Identifier>,

    /// Identifiers written more than once (in one output or across several)
    pub duplicated: Vec<Identifier>,

    /// Output identifiers that were never input
    pub unexpected: Vec<Identifier>,
}

impl PartitionCheck {
    pub fn is_sound(&self) -> bool {
        self.missing.is_empty() && self.duplicated.is_empty() && self.unexpected.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_sound() {
            format!("All {} identifiers appear in exactly one output", self.input_count)
        } else {
            format!(
                "Partition broken: {} missing, {} duplicated, {} unexpected (of {} identifiers)",
                self.missing.len(),
                self.duplicated.len(),
                self.unexpected.len(),
                self.input_count
            )
        }
    }
}

/// Check that `validated`, `unmatched` and `failures` partition `inputs`
pub fn check_partition(
    inputs: impl IntoIterator<Item = Identifier>,
    validated: &[Identifier],
    unmatched: &[Identifier],
    failures: &[Identifier],
) -> PartitionCheck {
    let inputs: BTreeSet<Identifier> = inputs.into_iter().collect();

    let mut seen: BTreeMap<Identifier, usize> = BTreeMap::new();
    for id in validated.iter().chain(unmatched).chain(failures) {
        *seen.entry(*id).or_insert(0) += 1;
    }

    PartitionCheck {
        input_count: inputs.len(),
        missing: inputs.iter().filter(|id| !seen.contains_key(*id)).copied().collect(),
        duplicated: seen.iter().filter(|(_, n)| **n > 1).map(|(id, _)| *id).collect(),
        unexpected: seen.keys().filter(|id| !inputs.contains(*id)).copied().collect(),
    }
}

/// Read one identifier column (by header name) from a CSV file
pub fn read_identifiers(path: &Path, column: &str) -> Result<Vec<Identifier>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_identifiers_from(file, column, &path.display().to_string())
}

pub fn read_identifiers_from<R: Read>(reader: R, column: &str, source: &str) -> Result<Vec<Identifier>> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr
        .headers()
        .with_context(|| format!("Failed to read CSV header in {}", source))?
        .clone();
    let index = headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| anyhow!("{}: missing column '{}'", source, column))?;

    let mut ids = Vec::new();
    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV line {} in {}", line_num + 2, source))?;
        let raw = record.get(index).unwrap_or("");
        let id = parse_identifier(raw).with_context(|| format!("{}: line {}", source, line_num + 2))?;
        ids.push(id);
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[i64]) -> Vec<Identifier> {
        values.iter().copied().map(Identifier).collect()
    }

    #[test]
    fn test_sound_partition() {
        let check = check_partition(
            ids(&[100001, 100002, 100003, 100001]),
            &ids(&[100001]),
            &ids(&[100002]),
            &ids(&[100003]),
        );
        assert!(check.is_sound());
        assert_eq!(check.input_count, 3);
        assert_eq!(check.summary(), "All 3 identifiers appear in exactly one output");
    }

    #[test]
    fn test_detects_missing_duplicated_unexpected() {
        let check = check_partition(
            ids(&[100001, 100002, 100003]),
            &ids(&[100001, 100009]),
            &ids(&[100001]),
            &ids(&[]),
        );

        assert!(!check.is_sound());
        assert_eq!(check.missing, ids(&[100002, 100003]));
        assert_eq!(check.duplicated, ids(&[100001]));
        assert_eq!(check.unexpected, ids(&[100009]));
    }

    #[test]
    fn test_duplicate_within_one_output() {
        let check = check_partition(ids(&[100001]), &ids(&[]), &ids(&[]), &ids(&[100001, 100001]));
        assert_eq!(check.duplicated, ids(&[100001]));
    }

    #[test]
    fn test_read_identifiers_by_column_name() {
        let csv = "date,time,ID,error_message\n2024-07-27,10:00:00,100004,bad\n2024-07-27,10:00:00,100006,worse\n";
        let read = read_identifiers_from(csv.as_bytes(), "ID", "error_log.csv").unwrap();
        assert_eq!(read, ids(&[100004, 100006]));
    }

    #[test]
    fn test_read_identifiers_missing_column() {
        let err = read_identifiers_from("id\n100001\n".as_bytes(), "ID", "merged.csv").unwrap_err();
        assert!(err.to_string().contains("missing column 'ID'"));
    }

    #[test]
    fn test_read_identifiers_header_only() {
        let read = read_identifiers_from("ID\n".as_bytes(), "ID", "unmatched.csv").unwrap();
        assert!(read.is_empty());
    }

    // ------------------------------------------------------------------------
    // End to end: CSV in → pipeline → CSV out → audit
    // ------------------------------------------------------------------------

    use crate::clock::FixedClock;
    use crate::config::PipelineConfig;
    use crate::loader::{load_demographics, load_observations};
    use crate::pipeline::{FailureEntry, Pipeline};
    use crate::reconciliation::UnmatchedIdentifier;
    use crate::records::PatientRecord;
    use crate::sink::{CsvSink, Sinks};
    use chrono::{TimeZone, Utc};
    use std::fs::{self, File};

    const PERSONS: &str = "\
id,forename,surname,date_of_birth,sex
100001,Alice,Smith,1970-05-01,F
100002,Bob,Jones,1955-11-30,M
100004,Eva,Brown,1988-02-14,F
100005,Liam,Davis,,M
100006,Jack,Moore,1990-01-01,M
";

    const MEDICAL: &str = "\
id,age,height,weight,blood_pressure,cholestrol_lvl,Notes
100001,54,175.0,70.0,120/80,200,Regular check-up
100003,61,180,82,130/85,250,
100004,36,160,55,140/90,305,Needs follow-up
100005,70,170,,110/70,180,
100006,34,182,90,120/85,210,irregular entry
";

    fn run_once(dir: &Path) -> PipelineConfig {
        let persons_path = dir.join("persons.csv");
        let medical_path = dir.join("medical.csv");
        fs::write(&persons_path, PERSONS).unwrap();
        fs::write(&medical_path, MEDICAL).unwrap();

        let mut config = PipelineConfig::default().with_output_dir(&dir.join("output"));
        config.inputs.demographics = persons_path;
        config.inputs.observations = medical_path;

        let demographics = load_demographics(&config.inputs.demographics).unwrap();
        let observations = load_observations(&config.inputs.observations).unwrap();

        let mut validated: CsvSink<File, PatientRecord> = CsvSink::create(&config.outputs.validated).unwrap();
        let mut unmatched: CsvSink<File, UnmatchedIdentifier> = CsvSink::create(&config.outputs.unmatched).unwrap();
        let mut failures: CsvSink<File, FailureEntry> = CsvSink::create(&config.outputs.failures).unwrap();

        Pipeline::from_config(&config)
            .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 7, 27, 8, 15, 0).unwrap()))
            .run(
                &demographics,
                &observations,
                Sinks {
                    validated: &mut validated,
                    unmatched: &mut unmatched,
                    failures: &mut failures,
                },
            )
            .unwrap();

        config
    }

    #[test]
    fn test_end_to_end_outputs_partition_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_once(dir.path());

        let validated = read_identifiers(&config.outputs.validated, "ID").unwrap();
        let unmatched = read_identifiers(&config.outputs.unmatched, "ID").unwrap();
        let failures = read_identifiers(&config.outputs.failures, "ID").unwrap();

        assert_eq!(validated, ids(&[100001, 100005]));
        assert_eq!(unmatched, ids(&[100002, 100003]));
        assert_eq!(failures, ids(&[100004, 100006]));

        let inputs = ids(&[100001, 100002, 100004, 100005, 100006, 100001, 100003, 100004, 100005, 100006]);
        let check = check_partition(inputs, &validated, &unmatched, &failures);
        assert!(check.is_sound(), "{}", check.summary());

        let log = fs::read_to_string(&config.outputs.failures).unwrap();
        assert!(log.contains("2024-07-27,08:15:00,100004,CHOL_LVL must be between 0 and 300"));
        assert!(log.contains("2024-07-27,08:15:00,100006,BP_LVL format is not valid"));
    }

    #[test]
    fn test_end_to_end_validated_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = run_once(dir.path());
        let merged = fs::read_to_string(&config.outputs.validated).unwrap();
        assert!(merged.starts_with("ID,FORENAME,SURNAME,DOB,SEX,HEIGHT_CM,WEIGHT_KG,BMI,BP_LVL,CHOL_LVL,NOTES\n"));
        assert!(merged.contains("100001,Alice,Smith,1970-05-01,F,175.0,70.0,23,120/80,200,Regular check-up\n"));
        // no DOB, no weight → no BMI
        assert!(merged.contains("100005,Liam,Davis,,M,170.0,,,110/70,180,\n"));
    }

    #[test]
    fn test_end_to_end_rerun_is_byte_identical() {
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let first = run_once(first_dir.path());
        let second = run_once(second_dir.path());

        for (a, b) in [
            (&first.outputs.validated, &second.outputs.validated),
            (&first.outputs.unmatched, &second.outputs.unmatched),
            (&first.outputs.failures, &second.outputs.failures),
        ] {
            assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
        }
    }
}
