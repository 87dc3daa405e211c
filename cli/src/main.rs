// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # answerloop CLI
//!
//! Console transport for the question loop: ask questions, report what
//! happened, run auto-validation, render reports and serve the HTTP API.
//!
//! ## Commands
//!
//! - `answerloop ask <QUESTION>` - Answer a question (cached, decided or escalated)
//! - `answerloop outcome <CHOICE_ID> <STATUS>` - Report how an answer worked out
//! - `answerloop validate` - Infer outcomes from implicit signals
//! - `answerloop report audit|effectiveness` - Render markdown reports
//! - `answerloop knowledge list|show` - Inspect learned answers
//! - `answerloop config show|validate|generate` - Configuration management
//! - `answerloop serve` - Run the HTTP API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use answerloop::commands::{
    self, AskArgs, ConfigCommand, KnowledgeCommand, OutcomeArgs, ReportCommand, ServeArgs,
    ValidateArgs,
};
use answerloop::embedded::GlobalOptions;

/// answerloop - Answer questions, escalate the uncertain ones, learn from outcomes
#[derive(Parser)]
#[command(name = "answerloop")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ANSWERLOOP_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true, env = "ANSWERLOOP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Data directory for the file storage backend
    #[arg(long, global = true, env = "ANSWERLOOP_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question
    #[command(name = "ask")]
    Ask(AskArgs),

    /// Report the outcome of an answered question
    #[command(name = "outcome")]
    Outcome(OutcomeArgs),

    /// Auto-validate recent choices from implicit signals
    #[command(name = "validate")]
    Validate(ValidateArgs),

    /// Render reports
    #[command(name = "report")]
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },

    /// Inspect the knowledge base
    #[command(name = "knowledge")]
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Serve the HTTP API
    #[command(name = "serve")]
    Serve(ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let options = GlobalOptions {
        config: cli.config,
        data_dir: cli.data_dir,
    };

    // Logging settings come from the config file unless overridden. A broken
    // config is reported by the command itself, so fall back quietly here.
    let logging = options
        .load_config()
        .map(|c| c.logging())
        .unwrap_or_else(|_| answerloop_core::domain::loop_config::LoopConfigManifest::default().logging());
    let level = cli.log_level.unwrap_or(logging.level);
    init_logging(&level, &logging.format)?;

    match cli.command {
        Some(Commands::Ask(args)) => commands::ask::execute(args, &options).await,
        Some(Commands::Outcome(args)) => commands::outcome::execute(args, &options).await,
        Some(Commands::Validate(args)) => commands::validate::execute(args, &options).await,
        Some(Commands::Report { command }) => commands::report::handle_command(command, &options).await,
        Some(Commands::Knowledge { command }) => {
            commands::knowledge::handle_command(command, &options).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, options.config.clone()).await
        }
        Some(Commands::Serve(args)) => commands::serve::execute(args, &options).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
///
/// Logs go to stderr so command output on stdout stays pipeable.
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
