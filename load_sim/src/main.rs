//! load_sim - run the micdrop driver lifecycle without a kernel.
//!
//! Reads a scenario of load attempts, plays each one through the same
//! `Lifecycle` the driver runs, against a simulated streaming host with the
//! injected statuses, and prints what `DriverEntry` returned.
//!
//! ```text
//! load_sim scenario.toml
//! load_sim --describe
//! ```

mod logging;
mod run;
mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use shared::MIC_CAPTURE_FILTER;
use std::{path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(name = "load_sim")]
#[command(about = "Drive the micdrop load/unload lifecycle against a simulated host")]
#[command(version)]
struct Cli {
    /// Scenario file (TOML)
    #[arg(required_unless_present = "describe")]
    scenario: Option<PathBuf>,

    /// Print the capability descriptor and exit
    #[arg(long)]
    describe: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.describe {
        print!("{MIC_CAPTURE_FILTER}");
        return Ok(ExitCode::SUCCESS);
    }

    let path = cli.scenario.context("no scenario given")?;
    let scenario = scenario::load(&path)?;
    logging::setup_logging(&scenario.logging).context("logging setup failed")?;
    log::info!("running {} load attempt(s) from {}", scenario.loads.len(), path.display());

    let report = run::run(&scenario)?;

    for o in &report.outcomes {
        println!("{:<16} {}  {}", o.identity, o.status, o.state);
    }
    println!("live factories: {}", report.live_factories);

    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        for fault in &report.faults {
            eprintln!("host fault: {fault:?}");
        }
        Ok(ExitCode::FAILURE)
    }
}
