//! CLI argument parsing for scrim.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scrim")]
#[command(
    about = "Turn script output into a live, filterable, selectable list",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging (logs to /tmp/scrim.log)
    #[arg(short, long)]
    pub debug: bool,

    /// Config file path (defaults to the XDG config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive launcher (default)
    Tui,

    /// Validate the config and print the parsed scripts and triggers
    Check,
}
