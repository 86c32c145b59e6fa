//! newsdesk CLI: incremental market-news collection and on-demand analysis.
//!
//! Collects from RSS feeds, the exchange disclosure API and a social news
//! API, filters with an LLM, and stores deduplicated records locally.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
