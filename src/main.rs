use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use types::OutputFmt;

mod cli;
mod commands;
mod core;
mod db;
mod models;
mod types;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let db_path = match std::env::var("REPCYCLE_DB") {
        Ok(p) => std::path::PathBuf::from(p),
        Err(_) => {
            let dir = dirs::data_dir()
                .context("could not determine data directory")?
                .join("repcycle");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating `{}`", dir.display()))?;
            dir.join("repcycle.db")
        }
    };

    let pool = db::open(&db_path.to_string_lossy()).await?;

    let fmt = if cli.json { OutputFmt::Json } else { OutputFmt::Pretty };

    match cli.cmd {
        Commands::Day(cmd) => commands::day::handle(cmd, &pool, fmt).await?,
        Commands::Plan(cmd) => commands::plan::handle(cmd, &pool, fmt).await?,
        Commands::Cycle(cmd) => commands::cycle::handle(cmd, &pool, fmt).await?,
        Commands::Exercise(cmd) => commands::exercise::handle(cmd, &pool, fmt).await?,
        Commands::Profile(cmd) => commands::profile::handle(cmd, &pool, fmt).await?,
        Commands::Calendar { year, month } => commands::calendar::handle(&pool, year, month).await?,
        Commands::Config(cmd) => commands::config::handle(cmd).await?,
    }

    Ok(())
}
