//! Error types for the harvester library.
//!
//! Two layers of errors exist:
//! - [`FetchError`] describes why a single HTTP retrieval failed. It is cheap to clone and is
//!   carried inside per-paper failure results, so a run can report exactly why each paper was
//!   not downloaded.
//! - [`HarvesterError`] covers everything else: configuration, persistence, parsing and the
//!   run-level conditions (an unreachable archive, an invalid year range).
//!
//! # Examples
//!
//! ```no_run
//! use harvester::{archive::YearRange, config::Config, pipeline::Harvester, prelude::*};
//!
//! # async fn example() -> Result<(), HarvesterError> {
//! let harvester = Harvester::new(Config::default())?;
//! match harvester.run(YearRange::new(1900, 1901)).await {
//!   Err(HarvesterError::InvalidYearRange { min, max, .. }) =>
//!     println!("Please pick years between {min} and {max}"),
//!   Err(e) => println!("Run failed: {e}"),
//!   Ok(report) => println!("Downloaded {}", report.progress.downloaded_papers),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

/// Error type alias used for the [`harvester`](crate) crate.
pub type Result<T> = core::result::Result<T, HarvesterError>;

/// Reasons a single HTTP retrieval can fail.
///
/// Every variant is considered transient by the [`Fetcher`](crate::fetch::Fetcher): it is
/// retried according to the configured backoff table and, once attempts are exhausted, recorded
/// as a failure of that one paper.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  /// The connect, read or total timeout elapsed.
  #[error("request to {url} timed out")]
  Timeout {
    /// The requested URL
    url: String,
  },

  /// No connection could be established (refused, reset, DNS failure).
  #[error("could not connect to {url}: {reason}")]
  Connect {
    /// The requested URL
    url:    String,
    /// Transport-level description of the failure
    reason: String,
  },

  /// The server answered with a non-2xx status code.
  #[error("{url} responded with status {status}")]
  Status {
    /// The requested URL
    url:    String,
    /// The HTTP status code received
    status: u16,
  },

  /// Any other failure while sending the request or reading the body.
  #[error("request to {url} failed: {reason}")]
  Request {
    /// The requested URL
    url:    String,
    /// Description of the failure
    reason: String,
  },
}

/// Errors that can occur while harvesting an archive.
#[derive(Error, Debug)]
pub enum HarvesterError {
  /// The archive could not be reached during the preflight check.
  ///
  /// This is the only condition that prevents a run from starting.
  #[error("Unable to reach {url}: {reason}")]
  Unreachable {
    /// The archive base URL
    url:    String,
    /// Why the preflight request failed
    reason: String,
  },

  /// An HTTP client could not be constructed.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// A single retrieval failed after all attempts.
  #[error(transparent)]
  Fetch(#[from] FetchError),

  /// A file system operation failed.
  ///
  /// This occurs when:
  /// - Creating the download or metadata directory fails
  /// - Writing a PDF or metadata record fails
  /// - Reading a configuration file fails
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Writing a CSV metadata record failed.
  #[error(transparent)]
  Csv(#[from] csv::Error),

  /// Writing a JSON Lines metadata record failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A configuration could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// A paper anchor had no following author node.
  ///
  /// The string parameter is the title of the affected paper.
  #[error("Paper \"{0}\" has no author node following its link")]
  MissingAuthor(String),

  /// A paper anchor had no link target.
  ///
  /// The string parameter is the title of the affected paper.
  #[error("Paper \"{0}\" has no link target")]
  MissingLink(String),

  /// A link found on an archive page could not be resolved against the base URL.
  #[error("Cannot resolve \"{link}\" against {base}: {source}")]
  InvalidLink {
    /// The archive base URL
    base:   String,
    /// The link as found on the page
    link:   String,
    /// Why resolution failed
    source: url::ParseError,
  },

  /// An existing CSV metadata store has different columns than the ones this run writes.
  ///
  /// Appending would leave rows of two widths in one file, so the store is left untouched.
  #[error("Metadata store {path:?} has columns \"{found}\" but this run writes \"{expected}\"")]
  MetadataLayout {
    /// Location of the store
    path:     std::path::PathBuf,
    /// Header found in the file
    found:    String,
    /// Header this run would write
    expected: String,
  },

  /// The requested year range ends before it starts.
  #[error("Year range {start}-{end} ends before it starts")]
  ReversedYearRange {
    /// First requested year
    start: u16,
    /// Last requested year
    end:   u16,
  },

  /// The requested year range reaches outside the years the archive provides.
  #[error("Year range {start}-{end} is outside the archive bounds {min}-{max}")]
  InvalidYearRange {
    /// First requested year
    start: u16,
    /// Last requested year
    end:   u16,
    /// Earliest year listed by the archive
    min:   u16,
    /// Latest year listed by the archive
    max:   u16,
  },

  /// The archive index page listed no year links.
  #[error("No year links were found on the archive index")]
  NoYearsFound,

  /// A completion was reported for a year whose paper count was never registered.
  #[error("Year {0} has no registered progress bucket")]
  UnregisteredYear(u16),

  /// An invalid configuration value.
  #[error("{0}")]
  Config(String),

  /// A blocking metadata write could not be joined.
  #[error(transparent)]
  Join(#[from] tokio::task::JoinError),
}
