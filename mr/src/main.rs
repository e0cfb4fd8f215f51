//! Mailroom - actor routing demo driver
//!
//! CLI entry point for running the demo setups.

use std::fs;
use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use mailroom::cli::{Cli, Command, generate_after_help};
use mailroom::config::Config;
use mailroom::demo::{self, DemoKind, DemoReport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailroom")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("mailroom.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Demo { kind, run_ms } => {
            if let Some(run_ms) = run_ms {
                config.demos.run_ms = run_ms;
            }
            cmd_demo(kind, &config).await
        }
        Command::Config => cmd_config(&config),
    }
}

/// Run one demo and print what it observed
async fn cmd_demo(kind: DemoKind, config: &Config) -> Result<()> {
    debug!(%kind, run_ms = config.demos.run_ms, "cmd_demo: called");
    println!("Running {} demo...", kind.to_string().cyan());

    let report = demo::run(kind, config)
        .await
        .context(format!("Demo '{}' failed", kind))?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &DemoReport) {
    for envelope in &report.deliveries {
        let metadata = serde_json::Value::Object(envelope.metadata().clone());
        println!(
            "{} {} {} {}",
            envelope.recipient().to_string().yellow(),
            "<-".dimmed(),
            envelope.sender(),
            metadata
        );
    }

    for (n, batch) in report.batches.iter().enumerate() {
        println!("{} Batch {} ({} responses)", "✓".green(), n + 1, batch.len());
        for record in batch {
            println!("  {} {}", record.request_id.to_string().dimmed(), record.response);
        }
    }

    for failure in &report.failures {
        println!(
            "{} {}/{}: {}",
            "✗".red(),
            failure.actor,
            failure.behavior,
            failure.error
        );
    }

    println!(
        "{} deliveries, {} batches, {} failures",
        report.deliveries.len(),
        report.batches.len(),
        report.failures.len()
    );
}

/// Print the effective configuration
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
