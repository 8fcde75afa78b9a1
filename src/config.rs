// ⚙️ Pipeline Configuration - paths + accepted values, as data
//
// Every field has a default, so `{}` is a complete config file.

use crate::validator::ValidationRules;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPaths {
    #[serde(default = "default_demographics")]
    pub demographics: PathBuf,

    #[serde(default = "default_observations")]
    pub observations: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPaths {
    #[serde(default = "default_validated")]
    pub validated: PathBuf,

    #[serde(default = "default_unmatched")]
    pub unmatched: PathBuf,

    #[serde(default = "default_failures")]
    pub failures: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub inputs: InputPaths,

    #[serde(default)]
    pub outputs: OutputPaths,

    #[serde(default)]
    pub rules: ValidationRules,

    /// Evaluate matched identifiers on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_demographics() -> PathBuf {
    PathBuf::from("input/persons.csv")
}

fn default_observations() -> PathBuf {
    PathBuf::from("input/medical.csv")
}

fn default_validated() -> PathBuf {
    PathBuf::from("output/merged_data.csv")
}

fn default_unmatched() -> PathBuf {
    PathBuf::from("output/unmatched_ids.csv")
}

fn default_failures() -> PathBuf {
    PathBuf::from("output/error_log.csv")
}

fn default_parallel() -> bool {
    true
}

impl Default for InputPaths {
    fn default() -> Self {
        InputPaths {
            demographics: default_demographics(),
            observations: default_observations(),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        OutputPaths {
            validated: default_validated(),
            unmatched: default_unmatched(),
            failures: default_failures(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            inputs: InputPaths::default(),
            outputs: OutputPaths::default(),
            rules: ValidationRules::default(),
            parallel: default_parallel(),
        }
    }
}

impl PipelineConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: PipelineConfig = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;

        Ok(config)
    }

    /// Keep output file names, move them under `dir`
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        let relocate = |path: &Path| match path.file_name() {
            Some(name) => dir.join(name),
            None => dir.join(path),
        };

        self.outputs = OutputPaths {
            validated: relocate(&self.outputs.validated),
            unmatched: relocate(&self.outputs.unmatched),
            failures: relocate(&self.outputs.failures),
        };
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.rules.blood_pressure_levels.is_empty() {
            bail!("rules.blood_pressure_levels must list at least one accepted reading");
        }

        let outputs = [&self.outputs.validated, &self.outputs.unmatched, &self.outputs.failures];
        for (i, a) in outputs.iter().enumerate() {
            if outputs[i + 1..].contains(a) {
                bail!("output paths must be distinct, {} is used twice", a.display());
            }
        }

        Ok(())
    }
}
