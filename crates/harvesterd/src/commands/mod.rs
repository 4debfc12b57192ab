use super::*;

pub mod download;
pub mod init;
pub mod years;

pub use download::{download, DownloadOptions};
pub use init::init;
pub use years::years;

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a configuration file with the default settings
  Init,

  /// List the years the archive provides
  Years,

  /// Download every paper of a range of years
  Download(DownloadOptions),
}
