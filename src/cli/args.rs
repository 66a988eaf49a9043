//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

/// Change notification server for browser hot reload
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: nsreload.toml)
    #[arg(short = 'C', long, global = true, default_value = "nsreload.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch sources and push changes to connected browsers
    #[command(visible_alias = "s")]
    Serve {
        #[command(flatten)]
        args: ServeArgs,
    },

    /// Print the namespaces that differ between two snapshot files
    #[command(visible_alias = "d")]
    Diff {
        /// Snapshot taken before the build
        #[arg(value_hint = clap::ValueHint::FilePath)]
        old: PathBuf,

        /// Snapshot taken after the build
        #[arg(value_hint = clap::ValueHint::FilePath)]
        new: PathBuf,
    },

    /// Capture an mtime snapshot of source directories as JSON
    Snapshot {
        /// Directories to scan (default: configured source paths)
        #[arg(value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
        dirs: Vec<PathBuf>,
    },
}

/// Serve command arguments. Each one overrides the config file.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
    #[arg(short, long)]
    pub interface: Option<IpAddr>,

    /// Port number to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Wait before forwarding a change to a client, in milliseconds
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
}

impl Cli {
    pub fn serve_args(&self) -> Option<&ServeArgs> {
        match &self.command {
            Commands::Serve { args } => Some(args),
            _ => None,
        }
    }
}
