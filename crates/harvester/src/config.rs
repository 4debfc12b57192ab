//! Configuration for a harvesting run.
//!
//! A [`Config`] is usually loaded from a TOML file (by default
//! `~/.config/harvester/config.toml` on Linux), with every missing field falling back to its
//! default. Individual values can then be overridden with the `with_*` builder methods, which is
//! how the command line front end applies its flags.
//!
//! # Examples
//!
//! ```toml
//! base_url = "https://papers.nips.cc"
//! download_dir = "/data/neurips/papers"
//! metadata_path = "/data/neurips/papers_metadata.csv"
//! metadata_format = "csv"
//! concurrency = 10
//! scrape_abstracts = false
//!
//! [timeouts]
//! connect_secs = 40
//! read_secs = 180
//! total_secs = 180
//!
//! [retry]
//! max_attempts = 5
//! backoff_secs = [2, 4, 8, 16, 32]
//! ```

use super::*;

/// Archive crawled when no other base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://papers.nips.cc";

/// Number of downloads allowed in flight at once when not configured otherwise.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Name of the application directory created under the platform directories.
const APP_DIR: &str = "harvester";

/// Settings for a harvesting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Base URL of the archive; its root page lists the year links
  pub base_url:         String,
  /// Directory receiving the downloaded PDFs, one subdirectory per year
  pub download_dir:     PathBuf,
  /// File receiving one metadata record per attempted paper
  pub metadata_path:    PathBuf,
  /// Layout of the metadata file
  pub metadata_format:  MetadataFormat,
  /// Maximum number of papers processed at the same time
  pub concurrency:      usize,
  /// Whether to fetch each paper's detail page and record its abstract
  pub scrape_abstracts: bool,
  /// `User-Agent` header sent with every request
  pub user_agent:       String,
  /// HTTP timeouts
  pub timeouts:         Timeouts,
  /// Retry behavior for every HTTP request
  pub retry:            RetryPolicy,
}

/// HTTP timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
  /// Time allowed to establish a connection
  pub connect_secs: u64,
  /// Time allowed between two reads of the response body
  pub read_secs:    u64,
  /// Time allowed for a whole request, body included
  pub total_secs:   u64,
}

impl Default for Timeouts {
  fn default() -> Self { Self { connect_secs: 40, read_secs: 180, total_secs: 180 } }
}

impl Timeouts {
  /// Connect timeout as a [`Duration`].
  pub fn connect(&self) -> Duration { Duration::from_secs(self.connect_secs) }

  /// Read timeout as a [`Duration`].
  pub fn read(&self) -> Duration { Duration::from_secs(self.read_secs) }

  /// Total request timeout as a [`Duration`].
  pub fn total(&self) -> Duration { Duration::from_secs(self.total_secs) }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      base_url:         DEFAULT_BASE_URL.to_string(),
      download_dir:     Self::default_download_dir(),
      metadata_path:    Self::default_metadata_path(),
      metadata_format:  MetadataFormat::default(),
      concurrency:      DEFAULT_CONCURRENCY,
      scrape_abstracts: false,
      user_agent:       format!("harvester/{}", env!("CARGO_PKG_VERSION")),
      timeouts:         Timeouts::default(),
      retry:            RetryPolicy::default(),
    }
  }
}

impl Config {
  /// Returns the default location of the configuration file.
  ///
  /// - On Unix: `~/.config/harvester/config.toml`
  /// - On macOS: `~/Library/Application Support/harvester/config.toml`
  /// - On Windows: `%APPDATA%\harvester\config.toml`
  /// - Fallback: `./harvester/config.toml`
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR).join("config.toml")
  }

  /// Returns the default download directory, `<documents>/harvester/papers`.
  pub fn default_download_dir() -> PathBuf {
    dirs::document_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR).join("papers")
  }

  /// Returns the default metadata file, `<data>/harvester/papers_metadata.csv`.
  pub fn default_metadata_path() -> PathBuf {
    dirs::data_dir()
      .unwrap_or_else(|| PathBuf::from("."))
      .join(APP_DIR)
      .join("papers_metadata.csv")
  }

  /// Reads a configuration from a TOML file.
  ///
  /// Fields absent from the file take their default values. The result is validated.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    debug!("Loaded configuration from {:?}", path.as_ref());
    Ok(config)
  }

  /// Reads a configuration from a TOML file, or returns the defaults if the file doesn't exist.
  pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
    if path.as_ref().exists() {
      Self::load(path)
    } else {
      debug!("No configuration at {:?}, using defaults", path.as_ref());
      Ok(Self::default())
    }
  }

  /// Writes this configuration as TOML, creating parent directories as needed.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Checks the values that would make a run impossible.
  pub fn validate(&self) -> Result<()> {
    if self.concurrency == 0 {
      return Err(HarvesterError::Config("concurrency must be at least 1".into()));
    }
    if self.retry.max_attempts == 0 {
      return Err(HarvesterError::Config("retry.max_attempts must be at least 1".into()));
    }
    match reqwest::Url::parse(&self.base_url) {
      Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
      Ok(url) => Err(HarvesterError::Config(format!(
        "base_url must use http or https, got \"{}\"",
        url.scheme()
      ))),
      Err(e) => Err(HarvesterError::Config(format!("invalid base_url \"{}\": {e}", self.base_url))),
    }
  }

  /// Sets the archive base URL.
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  /// Sets the download directory.
  pub fn with_download_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.download_dir = dir.as_ref().to_path_buf();
    self
  }

  /// Sets the metadata file.
  pub fn with_metadata_path(mut self, path: impl AsRef<Path>) -> Self {
    self.metadata_path = path.as_ref().to_path_buf();
    self
  }

  /// Sets the metadata file layout.
  pub fn with_metadata_format(mut self, format: MetadataFormat) -> Self {
    self.metadata_format = format;
    self
  }

  /// Sets the permit budget. The HTTP connection pool is sized to the same value.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency;
    self
  }

  /// Enables or disables abstract scraping.
  pub fn with_abstracts(mut self, scrape_abstracts: bool) -> Self {
    self.scrape_abstracts = scrape_abstracts;
    self
  }

  /// Sets the retry behavior.
  pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  /// Sets the HTTP timeouts.
  pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
    self.timeouts = timeouts;
    self
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config_is_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.concurrency, 10);
    assert_eq!(config.retry.max_attempts, 1);
    assert_eq!(config.metadata_format, MetadataFormat::Csv);
  }

  #[test]
  fn test_default_paths() {
    assert!(Config::default_path().ends_with("harvester/config.toml"));
    assert!(Config::default_download_dir().ends_with("harvester/papers"));
    assert!(Config::default_metadata_path().ends_with("harvester/papers_metadata.csv"));
  }

  #[traced_test]
  #[test]
  fn test_partial_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      "base_url = \"http://localhost:8080\"\nconcurrency = 3\n\n[retry]\nmax_attempts = 3\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.base_url, "http://localhost:8080");
    assert_eq!(config.concurrency, 3);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.backoff_secs, vec![2, 4, 8, 16, 32]);
    assert_eq!(config.timeouts, Timeouts::default());
  }

  #[test]
  fn test_save_then_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config::default()
      .with_base_url("https://example.org")
      .with_download_dir(dir.path().join("papers"))
      .with_metadata_format(MetadataFormat::JsonLines)
      .with_abstracts(true);

    config.save(&path).unwrap();
    assert_eq!(Config::load(&path).unwrap(), config);
  }

  #[test]
  fn test_missing_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load_or_default(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn test_validation_rejects_unusable_values() {
    assert!(matches!(
      Config::default().with_concurrency(0).validate(),
      Err(HarvesterError::Config(_))
    ));
    assert!(matches!(
      Config::default().with_retry(RetryPolicy::new(0, vec![])).validate(),
      Err(HarvesterError::Config(_))
    ));
    assert!(matches!(
      Config::default().with_base_url("ftp://papers.nips.cc").validate(),
      Err(HarvesterError::Config(_))
    ));
    assert!(matches!(
      Config::default().with_base_url("not a url").validate(),
      Err(HarvesterError::Config(_))
    ));
  }
}
