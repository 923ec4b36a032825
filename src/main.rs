use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;
mod config;
mod demo;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("loopview")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("loopview.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let mut builder = env_logger::Builder::from_default_env();
    // RUST_LOG wins over the configured level
    if let Some(level) = level {
        if std::env::var_os("RUST_LOG").is_none() {
            builder.parse_filters(level);
        }
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(config: &mut Config, command: Option<&Commands>) {
    if let Some(Commands::Demo {
        events,
        view_cycles,
        max_queued,
    }) = command
    {
        if let Some(events) = events {
            config.demo.events = *events;
        }
        if let Some(view_cycles) = view_cycles {
            config.demo.view_cycles = *view_cycles;
        }
        if let Some(max_queued) = max_queued {
            config.host.max_queued = *max_queued;
        }
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None | Some(Commands::Demo { .. }) => handle_demo_command(config).await,
        Some(Commands::Config) => handle_config_command(config),
    }
}

async fn handle_demo_command(config: &Config) -> Result<()> {
    info!(
        "Running demo: {} events x {} cycles, buffer {}",
        config.demo.events, config.demo.view_cycles, config.host.max_queued
    );
    println!(
        "{} {} events per cycle, {} cycles, signal buffer {}",
        "Demo:".green(),
        config.demo.events,
        config.demo.view_cycles,
        config.host.max_queued
    );

    let report = demo::run(&config.demo, config.host).await?;

    println!();
    println!("{}", "Summary".bold());
    println!("  final count:       {}", report.final_count);
    println!("  models delivered:  {}", report.models);
    println!("  signals delivered: {}", report.signals);
    Ok(())
}

fn handle_config_command(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;
    print!("{}", yaml);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    apply_overrides(&mut config, cli.command.as_ref());
    config.validate().context("Invalid configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
