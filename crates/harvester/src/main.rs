#![warn(missing_docs)]

//! harvester binary

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use harvester::cli::Cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config()?;
    tracing::info!(
        workers = config.workers,
        dup_threshold = config.dup_threshold,
        hash_file = %config.hash_file.display(),
        content_file = %config.content_file.display(),
        "harvester starting..."
    );

    let summary = harvester::run(&config).await?;
    println!("{}", summary);
    Ok(summary.exit_code())
}
