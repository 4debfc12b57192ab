//! Concurrent crawler and downloader for year-indexed academic paper archives.
//!
//! `harvester` walks an archive whose root page links to one index page per publication year
//! (the NeurIPS proceedings at `https://papers.nips.cc` being the canonical example), collects
//! every paper listed for the requested years, and downloads each paper's PDF while:
//!
//! - Bounding the number of in-flight downloads with a fixed permit budget
//! - Tolerating per-paper failures without aborting the run
//! - Appending one metadata record per attempted paper to a durable store
//! - Aggregating overall and per-year progress for live rendering
//!
//! # Getting Started
//!
//! ```no_run
//! use harvester::{archive::YearRange, config::Config, pipeline::Harvester, prelude::*};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = Config::default().with_concurrency(10);
//!   let harvester = Harvester::new(config)?;
//!
//!   // Fail fast if the archive cannot be reached at all
//!   harvester.preflight().await?;
//!
//!   // Watch progress while the run is underway
//!   let mut feed = harvester.progress().subscribe();
//!   tokio::spawn(async move {
//!     while feed.changed().await.is_ok() {
//!       println!("{:.2}%", feed.borrow_and_update().percent());
//!     }
//!   });
//!
//!   let report = harvester.run(YearRange::new(2022, 2023)).await?;
//!   println!(
//!     "downloaded {} / failed {} / total {}",
//!     report.progress.downloaded_papers, report.progress.failed_papers, report.progress.total_papers
//!   );
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`archive`]: Year index and paper index discovery, link derivation
//! - [`fetch`]: Bounded-timeout HTTP retrieval with a fixed backoff table
//! - [`pipeline`]: The download coordinator tying everything together
//! - [`metadata`]: Append-only metadata store (CSV or JSON Lines)
//! - [`progress`]: Shared progress aggregate and its snapshot feed
//! - [`config`]: TOML-backed configuration
//! - [`format`]: Filesystem-safe naming
//! - [`error`]: Error types
//! - [`prelude`]: Common traits and types for ergonomic imports

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::{BTreeMap, HashSet},
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod metadata;
pub mod pipeline;
pub mod progress;

use crate::{
  archive::*, config::*, error::*, fetch::*, format::*, metadata::*, progress::*,
};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use harvester::prelude::*;
///
/// fn check(result: Result<(), HarvesterError>) {
///   if let Err(HarvesterError::Unreachable { url, .. }) = result {
///     eprintln!("cannot reach {url}");
///   }
/// }
/// ```
pub mod prelude {
  pub use crate::{
    error::{FetchError, HarvesterError},
    fetch::Transport,
  };
}
