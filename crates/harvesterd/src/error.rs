//! Error types for the harvester CLI.

use thiserror::Error;

use super::*;

/// Error type alias used for the `harvesterd` crate.
pub type Result<T> = core::result::Result<T, HarvesterdError>;

/// Errors that can occur while running a CLI command.
#[derive(Error, Debug)]
pub enum HarvesterdError {
  /// An error from the underlying library.
  #[error(transparent)]
  Harvester(#[from] HarvesterError),

  /// A terminal prompt failed.
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// Reading from or writing to the terminal failed.
  #[error(transparent)]
  Io(#[from] std::io::Error),
}
