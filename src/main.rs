//! trueno-tune CLI
//!
//! # Usage
//!
//! ```bash
//! # Split a record file by dataset
//! trueno-tune split-data --data-path records.json --test-size 10 --split-seed 42
//!
//! # Tune a model against a seeded validation split
//! trueno-tune tune --model linear_regression --model-config-path model.json \
//!     --tuning-config-path tuning.json --tuning-output-dir tuning/ \
//!     --problem rank --train-path records_train.json --k 25 \
//!     --test-size 5 --split-seed 7 --output-dir out/
//!
//! # Pick up where an interrupted search stopped
//! trueno-tune tune ... --resume
//! ```

use std::process::ExitCode;

use clap::Parser;
use trueno_tune::cli::{init_tracing, run_command, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
