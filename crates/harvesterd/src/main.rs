//! Command line interface for the harvester paper downloader.
//!
//! This crate provides the `harvester` binary on top of the `harvester` library. It supports:
//! - Writing a starter configuration file
//! - Listing the years an archive provides
//! - Downloading every paper of a year range with live progress
//!
//! # Usage
//!
//! ```bash
//! # Write a configuration file with the default settings
//! harvester init
//!
//! # List the years available on the archive
//! harvester years
//!
//! # Download two years of papers, retrying failed requests up to 5 times
//! harvester download --start 2022 --end 2023 --retries 5 --output ~/papers
//!
//! # Prompt for the year range, record abstracts, and log to a daily rolling file
//! harvester --log-dir ~/.cache/harvester download --abstracts
//! ```
//!
//! Log verbosity is controlled with the `-v` flag (or `RUST_LOG`). Pressing Ctrl-C during a
//! download stops admitting new papers; those already downloading finish before the final tally.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use harvester::{
  archive::{YearIndex, YearRange},
  config::Config,
  metadata::MetadataFormat,
  pipeline::{Harvester, Outcome, RunReport},
  prelude::*,
  progress::ProgressSnapshot,
};
use tracing::{debug, trace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Crawl a year-indexed paper archive and download its PDFs")]
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
  /// configuration directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// Base URL of the archive, overriding the configured one
  #[arg(long, global = true)]
  base_url: Option<String>,

  /// Directory receiving a daily rolling log file in addition to the terminal output
  #[arg(long, global = true)]
  log_dir: Option<PathBuf>,

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

  /// Loads the configuration file (or the defaults) and applies the global overrides.
  fn load_config(&self) -> Result<Config> {
    let path = self.config_path();
    let mut config = Config::load_or_default(&path)?;
    debug!("Using configuration {path:?}");
    if let Some(base_url) = &self.base_url {
      config = config.with_base_url(base_url);
      config.validate()?;
    }
    Ok(config)
  }
}

/// Configures the logging system based on the verbosity level
///
/// # Arguments
///
/// * `verbosity` - Number of times the verbose flag was used (0-4)
/// * `log_dir` - Optional directory for a daily rolling log file
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
///
/// The returned guard flushes the log file when dropped and must be kept alive until exit.
fn setup_logging(verbosity: u8, log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  let terminal = fmt::layer()
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true);

  let (file, guard) = match log_dir {
    Some(dir) => {
      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "harvester.log"));
      let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .boxed();
      (Some(layer), Some(guard))
    },
    None => (None, None),
  };

  tracing_subscriber::registry().with(filter).with(terminal).with(file).init();
  guard
}

/// Entry point for the harvester CLI application
///
/// Handles command line argument parsing, sets up logging, and executes the requested command.
/// Errors are printed in the same style as the rest of the output and turn into a non-zero exit
/// code.
#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  let guard = setup_logging(cli.verbose, cli.log_dir.as_ref());
  trace!("Parsed command line");

  let interaction = Terminal::new(cli.accept_defaults);
  let result = match &cli.command {
    Commands::Init => init(&cli, &interaction),
    Commands::Years => years(&cli, &interaction).await,
    Commands::Download(options) => download(&cli, options, &interaction).await,
  };

  if let Err(e) = result {
    interaction.reply(ResponseContent::Error(&e)).ok();
    drop(guard);
    std::process::exit(1);
  }
}
