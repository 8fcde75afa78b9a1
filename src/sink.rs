// 📤 Output Sinks - where the three triage outputs go
//
// The pipeline only sees `OutputSink<T>`. In-memory `Vec<T>` for tests and
// embedding, `CsvSink` for files.

use crate::pipeline::FailureEntry;
use crate::reconciliation::UnmatchedIdentifier;
use crate::records::{Identifier, PatientRecord};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;

// ============================================================================
// CORE TRAIT
// ============================================================================

pub trait OutputSink<T> {
    fn write(&mut self, item: &T) -> Result<()>;

    /// Flush buffered output. Called once after the last write.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Clone> OutputSink<T> for Vec<T> {
    fn write(&mut self, item: &T) -> Result<()> {
        self.push(item.clone());
        Ok(())
    }
}

/// One sink per output collection
pub struct Sinks<'a> {
    pub validated: &'a mut dyn OutputSink<PatientRecord>,
    pub unmatched: &'a mut dyn OutputSink<UnmatchedIdentifier>,
    pub failures: &'a mut dyn OutputSink<FailureEntry>,
}

// ============================================================================
// CSV ROWS
// ============================================================================

/// A value with a fixed CSV layout
pub trait CsvRecord {
    const HEADER: &'static [&'static str];

    fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()>;
}

impl CsvRecord for PatientRecord {
    const HEADER: &'static [&'static str] = &[
        "ID", "FORENAME", "SURNAME", "DOB", "SEX", "HEIGHT_CM", "WEIGHT_KG", "BMI", "BP_LVL", "CHOL_LVL", "NOTES",
    ];

    fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.serialize(self)
    }
}

#[derive(Serialize)]
struct UnmatchedRow {
    #[serde(rename = "ID")]
    id: Identifier,
}

impl CsvRecord for UnmatchedIdentifier {
    const HEADER: &'static [&'static str] = &["ID"];

    fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.serialize(UnmatchedRow { id: self.id })
    }
}

#[derive(Serialize)]
struct FailureRow<'a> {
    date: String,
    time: String,
    #[serde(rename = "ID")]
    id: Identifier,
    error_message: &'a str,
}

impl CsvRecord for FailureEntry {
    const HEADER: &'static [&'static str] = &["date", "time", "ID", "error_message"];

    fn write_csv<W: Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.serialize(FailureRow {
            date: self.observed_at.format("%Y-%m-%d").to_string(),
            time: self.observed_at.format("%H:%M:%S").to_string(),
            id: self.failure.id,
            error_message: &self.failure.reason,
        })
    }
}

// ============================================================================
// CSV SINK
// ============================================================================

pub struct CsvSink<W: Write, T> {
    writer: csv::Writer<W>,
    rows: usize,
    _record: PhantomData<fn(&T)>,
}

impl<T: CsvRecord> CsvSink<File, T> {
    /// Create (or truncate) `path`, creating parent directories as needed
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;

        Self::from_writer(file)
    }
}

impl<W: Write, T: CsvRecord> CsvSink<W, T> {
    /// Wrap any writer; the header row is written immediately
    pub fn from_writer(inner: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer
            .write_record(T::HEADER)
            .context("Failed to write CSV header")?;

        Ok(CsvSink {
            writer,
            rows: 0,
            _record: PhantomData,
        })
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV sink: {}", e))
    }
}

impl<W: Write, T: CsvRecord> OutputSink<T> for CsvSink<W, T> {
    fn write(&mut self, item: &T) -> Result<()> {
        item.write_csv(&mut self.writer)
            .with_context(|| format!("Failed to write CSV row {}", self.rows + 1))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush CSV output")
    }
}

// ============================================================================
// TESTS
// ============================================================================
