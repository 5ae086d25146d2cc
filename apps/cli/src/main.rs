//! feedmill CLI — scheduled content ingestion.
//!
//! Runs the catalog, syndication, topic, ranking and roundup sources once,
//! links and persists what they produce, and exits non-zero only when every
//! source failed.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
