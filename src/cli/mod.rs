//! CLI module for loopview - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the demo loop
//! and inspecting the effective configuration.

pub mod commands;

pub use commands::Cli;
