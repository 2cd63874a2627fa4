//! `dcheck`: run a D compiler check, unit-test run and linter in one go.
//!
//! Every argument is passed through to the tools; the exit code is the
//! aggregate of their statuses.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use dcheck::core::planner::NESTED_MARKER_ENV;
use dcheck::exit_codes;
use dcheck::io::config::{CONFIG_ENV, config_path, load_config};
use dcheck::io::launch::ProcessLauncher;
use dcheck::logging;
use dcheck::pipeline::{PipelineRequest, run_pipeline};

#[derive(Parser)]
#[command(
    name = "dcheck",
    about = "Check, unit-test and lint D sources with a single compiler invocation",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Compiler arguments: source files and switches, passed through unchanged.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("dcheck: {:#}", err);
            std::process::exit(exit_codes::FATAL);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;
    let config = load_config(&config_path(
        &root,
        std::env::var_os(CONFIG_ENV).map(PathBuf::from),
    ))?;

    let request = PipelineRequest {
        root,
        args: cli.args,
        search_path: std::env::var_os("PATH"),
        nested: std::env::var_os(NESTED_MARKER_ENV).is_some(),
    };
    let launcher = ProcessLauncher {
        output_limit_bytes: config.output_limit_bytes,
    };
    let outcome = run_pipeline(
        &request,
        &config,
        &launcher,
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    )?;
    Ok(outcome.status.code())
}
