//! ztest: drives `.zt` literate test files against an external Lua runtime
//! and reports pass/fail per case with source-line traceability.
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

mod asserts;
mod blocks;
mod config;
mod exec;
mod harness;
mod loader;
mod model;
mod pipeline;
mod script;
mod templates;

use config::{Config, RootArgs};
use harness::Harness;
use loader::LineLoader;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: RootArgs) -> Result<bool> {
    let config = Config::from_args(args);
    let harness = Harness::new(&config)?;
    let report = harness.run(&LineLoader, &config.root)?;

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        tracing::info!(
            "{} passed, {} failed, {} skipped",
            report.passed,
            report.failed,
            report.skipped
        );
    }
    Ok(report.ok())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("ZTEST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
