//! nsreload - change notification server for ClojureScript hot reload.

mod actor;
mod cli;
mod codec;
mod config;
mod core;
mod freshness;
mod hooks;
mod logger;
mod reload;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::ReloadConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(ReloadConfig::load(&cli)?),
        Commands::Diff { old, new } => cli::inspect::diff_snapshots(old, new),
        Commands::Snapshot { dirs } => {
            cli::inspect::print_snapshot(dirs, &ReloadConfig::load(&cli)?)
        }
    }
}
