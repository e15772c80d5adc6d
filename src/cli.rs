//! Command-line interface
//!
//! ```bash
//! # Hold out 10 datasets for final testing
//! trueno-tune split-data --data-path records.json --test-size 10 --split-seed 42
//!
//! # Tune a model on the training file
//! trueno-tune tune --model dna_regression \
//!     --model-config-path dna.json --tuning-config-path random.json \
//!     --tuning-output-dir tuning/ --output-dir out/ \
//!     --problem regression --problem rank --objective top_k_regret \
//!     --train-path records_train.json --k 25 --metafeature-subset all \
//!     --test-size 5 --split-seed 9232859745 --model-seed 0
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{ModelConfig, TuningConfig};
use crate::coordinator::{split_data, Coordinator, TuneRequest};
use crate::loader::load_corpus;
use crate::objective::Objective;
use crate::preprocess::MetafeatureSubset;
use crate::problem::ProblemKind;
use crate::run::RunContext;
use crate::split::SplitSpec;

/// trueno-tune: deterministic hyperparameter tuning for pipeline-ranking models
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "trueno-tune")]
#[command(version)]
#[command(about = "Tune metafeature-based pipeline ranking models by top-k regret")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Split a record file into train and test files by dataset
    SplitData(SplitDataArgs),

    /// Search hyperparameters of a model against a validation split
    Tune(TuneArgs),
}

/// Arguments for the split-data command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct SplitDataArgs {
    /// JSON record file to split
    #[arg(long)]
    pub data_path: PathBuf,

    /// Number of datasets in the test file
    #[arg(long)]
    pub test_size: usize,

    /// Shuffle seed
    #[arg(long)]
    pub split_seed: u64,

    /// Directory for the output files (default: next to the input)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Arguments for the tune command
#[derive(Parser, Debug, Clone, PartialEq)]
pub struct TuneArgs {
    /// Registry model name
    #[arg(long)]
    pub model: String,

    /// Model config JSON (fixed values and search space)
    #[arg(long)]
    pub model_config_path: PathBuf,

    /// Tuning config JSON (strategy and budget)
    #[arg(long)]
    pub tuning_config_path: PathBuf,

    /// Directory for the candidate history log
    #[arg(long)]
    pub tuning_output_dir: PathBuf,

    /// Problem formulations to score (repeatable)
    #[arg(long = "problem", required = true, num_args = 1..)]
    pub problems: Vec<ProblemKind>,

    /// Objective to minimize
    #[arg(long, default_value = "top_k_regret")]
    pub objective: Objective,

    /// JSON record file to tune on
    #[arg(long)]
    pub train_path: PathBuf,

    /// Regret k
    #[arg(long)]
    pub k: usize,

    /// Metafeature subset: all, landmarkers or non-landmarkers
    #[arg(long, default_value = "all")]
    pub metafeature_subset: MetafeatureSubset,

    /// Number of datasets in the validation split
    #[arg(long)]
    pub test_size: usize,

    /// Validation split seed
    #[arg(long)]
    pub split_seed: u64,

    /// Seed for model initialization and training
    #[arg(long, default_value_t = 0)]
    pub model_seed: u64,

    /// Directory for tuning_run.json
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Continue from the history log in the tuning output directory
    #[arg(long)]
    pub resume: bool,
}

impl TuneArgs {
    /// Run parameters described by these arguments.
    #[must_use]
    pub fn context(&self) -> RunContext {
        RunContext::new(
            self.model.clone(),
            self.problems.clone(),
            self.k,
            SplitSpec::new(self.test_size, self.split_seed),
        )
        .with_model_seed(self.model_seed)
        .with_objective(self.objective)
        .with_metafeature_subset(self.metafeature_subset)
    }
}

/// Parse arguments from an iterator (testable).
///
/// # Errors
///
/// Returns a clap error for unknown flags or invalid values.
pub fn parse_args<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}

/// Install the global subscriber. `RUST_LOG` overrides the level.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // A second call (tests) leaves the first subscriber in place
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .try_init();
}

/// Execute a parsed command.
///
/// # Errors
///
/// Returns the first configuration, data or search error, with context.
pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::SplitData(args) => {
            let (train, test) = split_data(
                &args.data_path,
                args.test_size,
                args.split_seed,
                args.output_dir.as_deref(),
            )
            .with_context(|| format!("splitting {}", args.data_path.display()))?;
            println!("train: {}", train.display());
            println!("test:  {}", test.display());
            Ok(())
        }
        Command::Tune(args) => tune(&args),
    }
}

fn tune(args: &TuneArgs) -> anyhow::Result<()> {
    let context = args.context();
    // Cheap checks first: nothing is read before the parameters make sense
    context.validate()?;
    let model_config = ModelConfig::load(&args.model_config_path)?;
    let tuning_config = TuningConfig::load(&args.tuning_config_path)?;
    let corpus = load_corpus(&args.train_path)
        .with_context(|| format!("loading {}", args.train_path.display()))?;

    let run = Coordinator::new(TuneRequest {
        context,
        model_config,
        tuning_config,
        tuning_output_dir: args.tuning_output_dir.clone(),
        output_dir: args.output_dir.clone(),
        resume: args.resume,
    })
    .run(&corpus)?;

    println!("status: {:?}", run.status());
    println!("candidates: {}", run.candidates().len());
    if let (Some(objective), Some(configuration)) = (run.best_objective(), run.best_configuration()) {
        println!("best {}: {objective:.6}", args.objective);
        println!("best configuration: {configuration}");
        for (problem, value) in run.best_breakdown() {
            println!("  {problem}: {value:.6}");
        }
    }
    Ok(())
}
