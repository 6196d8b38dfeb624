use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Clone, Debug, Parser)]
#[command(name = "dexsync", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors and hide the progress bar
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that take precedence over the configuration file.
#[derive(Clone, Debug, Default, ClapArgs)]
pub struct Overrides {
    /// Root of the mirrored tree
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Maximum number of transfers open at once
    #[arg(short, long, global = true)]
    pub window: Option<usize>,

    /// Per-transfer timeout in seconds
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,

    /// Send stored validators even when the local file is missing
    #[arg(long, global = true)]
    pub revalidate_missing: bool,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Refresh set lists, card lists and card images in order
    #[command(alias = "s", name = "sync")]
    Sync,
    /// Refresh the set list of every language
    #[command(name = "sets")]
    Sets,
    /// Refresh the card list of every known set
    #[command(name = "cards")]
    Cards,
    /// Download card images for every known card
    #[command(alias = "img", name = "images")]
    Images,
    /// List stored validators
    #[command(name = "store")]
    Store,
    /// Print the effective configuration
    #[command(alias = "cfg", name = "config")]
    Config,
}
