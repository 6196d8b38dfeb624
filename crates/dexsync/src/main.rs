mod catalog;
mod cli;
mod commands;
mod config;
mod logging;
mod progress;
mod sanitize;

use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use crate::catalog::Stage;
use crate::cli::{Args, Commands};
use crate::commands::CommandExecutor;
use crate::config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    logging::init(args.verbose, args.quiet);

    let mut config = AppConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides);
    config.validate()?;
    info!(data_dir = %config.data_dir.display(), window = config.window, "dexsync started");

    let executor = CommandExecutor::new(config, args.quiet);

    match args.command {
        Commands::Sync => {
            executor.sync(&Stage::ALL).await?;
        }
        Commands::Sets => {
            executor.sync(&[Stage::Sets]).await?;
        }
        Commands::Cards => {
            executor.sync(&[Stage::Cards]).await?;
        }
        Commands::Images => {
            executor.sync(&[Stage::Images]).await?;
        }
        Commands::Store => {
            let count = executor.list_store()?;
            info!(count, "listed stored validators");
        }
        Commands::Config => executor.show_config()?,
    }

    Ok(())
}
