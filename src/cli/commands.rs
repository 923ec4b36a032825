//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - demo: run a counter loop through several view recreation cycles
//! - config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Loopview - keeps an event loop alive across view recreation
#[derive(Parser, Debug)]
#[command(name = "loopview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the counter demo through view recreation cycles
    Demo {
        /// Events dispatched per view cycle
        #[arg(short, long)]
        events: Option<u32>,

        /// Number of view recreation cycles
        #[arg(long)]
        view_cycles: Option<u32>,

        /// Signal buffer capacity while the view is hidden
        #[arg(short, long)]
        max_queued: Option<usize>,
    },

    /// Print the effective configuration
    Config,
}
