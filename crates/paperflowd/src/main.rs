//! Command line interface for the paperflow paper tracking pipeline.
//!
//! This crate provides the `paperflow` binary on top of the `paperflow` library. It supports:
//! - Writing a configuration and creating the record store
//! - Running the pipeline over text files or inline text, a Scholar alert mailbox, or a web
//!   search
//! - Listing, removing and cleaning up tracked papers
//!
//! # Usage
//!
//! ```bash
//! # Write a configuration and create the database
//! paperflow init --labels fintech,llm
//!
//! # Process every URL found in a saved alert
//! paperflow run alert.txt --subject fintech
//!
//! # Process today's Scholar alerts
//! paperflow mail
//!
//! # Search the web for papers
//! paperflow search "deep hedging"
//!
//! # Show what is tracked
//! paperflow list --contains fintech
//! ```
//!
//! Destructive commands ask for confirmation unless `--accept-defaults` is given. Logging
//! verbosity is controlled with repeated `-v` flags or `RUST_LOG`.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use paperflow::{
  config::Config,
  database::{Database, SubjectFilter},
  error::PaperflowError,
  pipeline::{Pipeline, RunReport},
  prelude::*,
  record::Paper,
};
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Harvest, download, convert, classify and summarize papers")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Path to the configuration file. If not specified, uses the default platform-specific
  /// config directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,

  /// Skip all prompts and accept defaults (mostly for testing)
  #[arg(long, hide = true, global = true)]
  accept_defaults: bool,
}

impl Cli {
  /// The configuration file in use.
  fn config_path(&self) -> PathBuf { self.config.clone().unwrap_or_else(Config::default_path) }

  /// Loads the configuration, falling back to the defaults when no file exists yet.
  fn load_config(&self) -> Result<Config> {
    let path = self.config_path();
    trace!("Using configuration at: {}", path.display());
    Ok(Config::load_or_default(&path)?)
  }
}

/// Configures the logging system based on the verbosity level
///
/// # Arguments
///
/// * `verbosity` - Number of times the verbose flag was used
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .init();
}

/// Entry point for the `paperflow` CLI application
///
/// Parses the command line, sets up logging and runs the requested command. Any error is
/// reported on stderr and the process exits with status 1.
#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  let result = match cli.command.clone() {
    Commands::Init(options) => init(&cli, options).await,
    Commands::Run(options) => run(&cli, options).await,
    Commands::Mail => mail(&cli).await,
    Commands::Search(options) => search(&cli, options).await,
    Commands::List(options) => list(&cli, options).await,
    Commands::Remove(options) => remove(&cli, options).await,
    Commands::Clean => clean(&cli).await,
  };

  if let Err(e) = result {
    debug!(error = ?e, "command failed");
    if cli.reply(ResponseContent::Error(e)).is_err() {
      eprintln!("paperflow: failed to report the error");
    }
    std::process::exit(1);
  }
}
