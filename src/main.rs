mod auth;
mod cli;
mod config;
mod error;
mod insights;
mod output;
mod providers;
mod trends;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting citrend - CI Pipeline Trend Analyzer");
    cli.execute().await?;

    Ok(())
}
