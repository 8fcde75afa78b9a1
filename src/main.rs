use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use patient_merge::{
    check_partition, hash_data, load_demographics, load_observations, read_identifiers, CsvSink,
    FailureEntry, PatientRecord, Pipeline, PipelineConfig, Sinks, UnmatchedIdentifier,
};

#[derive(Parser)]
#[command(name = "patient-merge", version)]
#[command(about = "Merge demographic and medical tables, validate, and triage every identifier")]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge both tables and write validated, unmatched and failure outputs
    Run {
        #[command(flatten)]
        paths: PathArgs,

        /// Evaluate records on the current thread only
        #[arg(long)]
        sequential: bool,
    },

    /// Check that a previous run's outputs account for every input identifier exactly once
    Verify {
        #[command(flatten)]
        paths: PathArgs,
    },

    /// Print the SHA-256 hex digest of TEXT
    Hash { text: String },
}

#[derive(Args)]
struct PathArgs {
    /// JSON config file (defaults apply for anything it omits)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Demographic table (persons.csv)
    #[arg(long)]
    demographics: Option<PathBuf>,

    /// Observation table (medical.csv)
    #[arg(long)]
    observations: Option<PathBuf>,

    /// Directory for the three output files
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl PathArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(path) = &self.demographics {
            config.inputs.demographics = path.clone();
        }
        if let Some(path) = &self.observations {
            config.inputs.observations = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config = config.with_output_dir(dir);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Run { paths, sequential } => {
            let mut config = paths.resolve()?;
            if sequential {
                config.parallel = false;
            }
            run_pipeline(&config)
        }
        Command::Verify { paths } => run_verify(&paths.resolve()?),
        Command::Hash { text } => {
            println!("Original data: {}", text);
            println!("Hashed data: {}", hash_data(&text));
            Ok(())
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_pipeline(config: &PipelineConfig) -> Result<()> {
    println!("🩺 Patient Merge - persons + medical → validated / unmatched / failures");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load both source tables
    println!("\n📂 Loading source tables...");
    let demographics = load_demographics(&config.inputs.demographics)?;
    let observations = load_observations(&config.inputs.observations)?;
    println!(
        "✓ {} demographic rows, {} observation rows",
        demographics.len(),
        observations.len()
    );

    // 2. Open sinks
    let mut validated: CsvSink<File, PatientRecord> = CsvSink::create(&config.outputs.validated)?;
    let mut unmatched: CsvSink<File, UnmatchedIdentifier> = CsvSink::create(&config.outputs.unmatched)?;
    let mut failures: CsvSink<File, FailureEntry> = CsvSink::create(&config.outputs.failures)?;

    // 3. Triage
    println!("\n⚙️  Reconciling and validating...");
    let report = Pipeline::from_config(config).run(
        &demographics,
        &observations,
        Sinks {
            validated: &mut validated,
            unmatched: &mut unmatched,
            failures: &mut failures,
        },
    )?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} validated → {}", report.validated_count, config.outputs.validated.display());
    println!("✓ {} unmatched → {}", report.unmatched_count, config.outputs.unmatched.display());
    println!("✓ {} rejected  → {}", report.rejected_count, config.outputs.failures.display());
    println!("🔐 Fingerprint: {}", report.fingerprint);

    Ok(())
}

fn run_verify(config: &PipelineConfig) -> Result<()> {
    let demographics = load_demographics(&config.inputs.demographics)?;
    let observations = load_observations(&config.inputs.observations)?;
    let inputs = demographics.keys().chain(observations.keys()).copied();

    let check = check_partition(
        inputs,
        &read_identifiers(&config.outputs.validated, "ID")?,
        &read_identifiers(&config.outputs.unmatched, "ID")?,
        &read_identifiers(&config.outputs.failures, "ID")?,
    );

    if check.is_sound() {
        println!("✅ {}", check.summary());
        return Ok(());
    }

    eprintln!("❌ {}", check.summary());
    for id in &check.missing {
        eprintln!("   missing:    {}", id);
    }
    for id in &check.duplicated {
        eprintln!("   duplicated: {}", id);
    }
    for id in &check.unexpected {
        eprintln!("   unexpected: {}", id);
    }
    std::process::exit(1);
}
