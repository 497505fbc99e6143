//! autoblast command-line entry point
//!
//! Exit codes:
//! - 0: every batch completed
//! - 2: the run finished but some batches timed out or failed
//! - 1: fatal error (input, configuration, tool could not start, I/O)

use anyhow::{Context, Result};
use autoblast::{run_pipeline, RunSummary};
use autoblast_logging::{init_console_logging, init_logging, LogConfig};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, info, warn};

mod cli;

use cli::config::{resolve, FileConfig};
use cli::error::{print_json_error, HelpfulError};
use cli::Cli;

const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    // Usage errors exit 1; 2 is reserved for partial runs.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match init_logging(LogConfig {
        app_name: "autoblast",
        verbose: cli.verbose,
        log_dir: None,
    }) {
        Ok(log_path) => debug!("Logging to {}", log_path.display()),
        Err(err) => {
            eprintln!("Warning: {:#}; logging to stderr only", err);
            if let Err(err) = init_console_logging(cli.verbose) {
                eprintln!("Warning: {:#}", err);
            }
        }
    }

    let json_mode = cli.json;
    match run(cli) {
        Ok(summary) => {
            if json_mode {
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{}", text),
                    Err(err) => {
                        print_json_error(&anyhow::Error::new(err));
                        return ExitCode::from(1);
                    }
                }
            } else {
                cli::output::print_summary(&summary);
            }
            if summary.is_partial() {
                warn!(
                    "{} batches timed out, {} failed",
                    summary.timed_out.len(),
                    summary.failed.len()
                );
                ExitCode::from(EXIT_PARTIAL)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            if json_mode {
                print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary> {
    let file_config = FileConfig::discover(cli.config.as_deref()).map_err(HelpfulError::from)?;
    let config = resolve(&cli, file_config).map_err(HelpfulError::from)?;
    info!(
        "Running {} against '{}' ({} concurrent jobs, {}s timeout)",
        config.binary.display(),
        config.database,
        config.max_concurrent,
        config.timeout.as_secs()
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        tokio::select! {
            result = run_pipeline(config) => {
                result.map_err(|e| anyhow::Error::new(HelpfulError::from(e)))
            }
            Ok(()) = tokio::signal::ctrl_c() => {
                warn!("Interrupted; stopping running jobs");
                Err(anyhow::Error::new(HelpfulError::interrupted()))
            }
        }
    })
}
