//! Command-line entry point of the splatting profiler.

mod bench;
mod config;
mod driver;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "regsplat", version, about = "Region feature splatting toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure the execution time of the splatting methods under the sweeps
    /// described by a configuration file.
    Profile {
        /// Path of the profiler configuration file.
        config: PathBuf,
        /// Directory receiving the results; a new dated directory is created
        /// inside it holding all outputs of the run.
        #[arg(long, short = 'o')]
        output: PathBuf,
        /// Number of threads running profiler jobs concurrently.
        #[arg(short = 't', default_value_t = 1)]
        threads: usize,
    },
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Profile {
            config,
            output,
            threads,
        } => {
            let text = std::fs::read_to_string(&config)
                .with_context(|| format!("reading the configuration {}", config.display()))?;
            let config: Config = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing the configuration {}", config.display()))?;
            driver::run(&config, &output, threads)
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(source) => {
            eprintln!("error: {source:#}");
            ExitCode::FAILURE
        }
    }
}
