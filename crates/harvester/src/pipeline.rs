//! The download coordinator.
//!
//! A [`Harvester`] runs the whole crawl for a [`YearRange`]:
//!
//! 1. The archive root page is fetched and the range is validated against the listed years.
//! 2. For each listed year inside the range, the year page is fetched and every paper entry
//!    becomes a [`DownloadTask`]. The year's paper count is registered with the
//!    [`ProgressTracker`] before any of its tasks is spawned.
//! 3. Every task waits for one of `concurrency` permits, then fetches the PDF (and optionally the
//!    abstract), writes the file, appends exactly one metadata record and reports exactly one
//!    completion to the tracker.
//!
//! Tasks are independent: a failed paper is reported in the [`RunReport`] and never affects its
//! siblings. A run always ends with a final tally unless the archive can't be read at all.
//!
//! Once a stop is requested through a [`StopHandle`], tasks still waiting for a permit are never
//! admitted and no further year is discovered; admitted tasks run to completion. The permits are
//! closed for good, so a stopped harvester can't be reused.

use std::io::Write;

use tokio::{sync::Semaphore, task::JoinSet};

use super::*;

/// One paper to download. Created during discovery and consumed by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
  /// Publication year
  pub year:       u16,
  /// Paper title as listed
  pub title:      String,
  /// Author list as listed
  pub author:     String,
  /// Absolute URL of the PDF
  pub pdf_url:    String,
  /// Absolute URL of the detail page
  pub detail_url: String,
  /// Name of the PDF inside its year directory
  pub file_name:  PathBuf,
}

impl DownloadTask {
  /// Builds the task for `entry`, listed under `year` on the archive at `base_url`.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::InvalidLink`] if the entry's link can't be resolved.
  pub fn from_entry(base_url: &str, year: u16, entry: &PaperEntry) -> Result<Self> {
    Ok(Self {
      year,
      title: entry.title.clone(),
      author: entry.author.clone(),
      pdf_url: absolute_url(base_url, &derive_download_url(&entry.detail_link))?,
      detail_url: absolute_url(base_url, &entry.detail_link)?,
      file_name: pdf_filename(&entry.title),
    })
  }

  /// Where the PDF is stored: `<download_dir>/<year>/<file_name>`.
  pub fn file_path(&self, download_dir: &Path) -> PathBuf {
    download_dir.join(self.year.to_string()).join(&self.file_name)
  }
}

/// File names already handed out during a run, per year.
#[derive(Debug, Default)]
struct FileNames {
  /// Claimed `(year, file name)` pairs
  taken: HashSet<(u16, PathBuf)>,
}

impl FileNames {
  /// Gives `task` a file name no other task of its year has, numbering it if its title's name
  /// is taken.
  fn claim(&mut self, task: &mut DownloadTask) {
    let mut n = 2;
    while !self.taken.insert((task.year, task.file_name.clone())) {
      task.file_name = numbered_pdf_filename(&task.title, n);
      n += 1;
    }
    if n > 2 {
      debug!("Saving \"{}\" as {:?}, its name is taken", task.title, task.file_name);
    }
  }
}

/// Why a paper wasn't downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
  /// The PDF couldn't be retrieved
  Fetch(FetchError),
  /// The PDF was retrieved but couldn't be written
  Persist(String),
}

impl Display for FailureReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Fetch(e) => write!(f, "{e}"),
      Self::Persist(reason) => write!(f, "could not write file: {reason}"),
    }
  }
}

/// Terminal state of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The PDF is on disk
  Persisted {
    /// Final location of the file
    path: PathBuf,
  },
  /// The PDF isn't on disk
  Failed {
    /// What went wrong
    reason: FailureReason,
  },
}

impl Outcome {
  /// The progress status this outcome counts as.
  pub fn status(&self) -> Status {
    match self {
      Self::Persisted { .. } => Status::Downloaded,
      Self::Failed { .. } => Status::Failed,
    }
  }

  /// Whether the PDF was written.
  pub fn is_persisted(&self) -> bool { matches!(self, Self::Persisted { .. }) }
}

/// Result of one admitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
  /// Publication year
  pub year:    u16,
  /// Paper title as listed
  pub title:   String,
  /// What happened
  pub outcome: Outcome,
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
  /// Final progress counters
  pub progress: ProgressSnapshot,
  /// Every paper that failed, with its reason
  pub failures: Vec<DownloadResult>,
  /// Whether the run was stopped before all papers were attempted
  pub stopped:  bool,
}

impl RunReport {
  /// Papers discovered but never attempted.
  pub fn pending(&self) -> usize {
    self.progress.total_papers.saturating_sub(self.progress.completed())
  }
}

/// Requests a cooperative stop of a running [`Harvester`].
#[derive(Debug, Clone)]
pub struct StopHandle {
  /// Set once a stop was requested
  flag:    Arc<AtomicBool>,
  /// Admission permits, closed on stop
  permits: Arc<Semaphore>,
}

impl StopHandle {
  /// Stops admitting tasks. Tasks already holding a permit finish normally.
  pub fn stop(&self) {
    if !self.flag.swap(true, Ordering::SeqCst) {
      info!("Stop requested, no further papers will be admitted");
    }
    self.permits.close();
  }

  /// Whether a stop was requested.
  pub fn is_stopped(&self) -> bool { self.flag.load(Ordering::SeqCst) }
}

/// Crawls an archive and downloads the papers of a year range.
#[derive(Debug)]
pub struct Harvester<T = HttpTransport> {
  /// Settings of the run
  config:   Config,
  /// Client for the archive pages
  archive:  Archive<T>,
  /// Retrieval layer shared with the archive client
  fetcher:  Arc<Fetcher<T>>,
  /// Metadata store shared by all tasks
  metadata: Arc<MetadataSink>,
  /// Progress shared by all tasks
  progress: Arc<ProgressTracker>,
  /// Admission permits
  permits:  Arc<Semaphore>,
  /// Cooperative stop
  stop:     StopHandle,
}

impl Harvester<HttpTransport> {
  /// Creates a harvester talking HTTP to `config.base_url`.
  ///
  /// Must be called from within a Tokio runtime; metadata writes are spawned on it.
  pub fn new(config: Config) -> Result<Self> {
    let transport = HttpTransport::new(&config)?;
    Self::with_transport(config, transport)
  }
}

impl<T: Transport + 'static> Harvester<T> {
  /// Creates a harvester retrieving every page and file through `transport`.
  ///
  /// # Errors
  ///
  /// Fails if `config` is invalid or if no Tokio runtime is running.
  pub fn with_transport(config: Config, transport: T) -> Result<Self> {
    config.validate()?;
    let runtime = tokio::runtime::Handle::try_current()
      .map_err(|e| HarvesterError::Config(format!("a Tokio runtime is required: {e}")))?;

    let fetcher = Arc::new(Fetcher::new(transport, config.retry.clone()));
    let archive = Archive::new(config.base_url.clone(), Arc::clone(&fetcher));
    let metadata = Arc::new(MetadataSink::new(
      &config.metadata_path,
      config.metadata_format,
      config.scrape_abstracts,
      runtime,
    ));
    let permits = Arc::new(Semaphore::new(config.concurrency));
    let stop = StopHandle { flag: Arc::new(AtomicBool::new(false)), permits: Arc::clone(&permits) };

    Ok(Self { config, archive, fetcher, metadata, progress: ProgressTracker::new(), permits, stop })
  }

  /// The settings of this harvester.
  pub fn config(&self) -> &Config { &self.config }

  /// The archive client.
  pub fn archive(&self) -> &Archive<T> { &self.archive }

  /// The progress aggregate; subscribe to it to follow a run.
  pub fn progress(&self) -> &Arc<ProgressTracker> { &self.progress }

  /// A handle to stop a run from another task.
  pub fn stop_handle(&self) -> StopHandle { self.stop.clone() }

  /// Checks that the archive is reachable.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::Unreachable`] if it isn't.
  pub async fn preflight(&self) -> Result<()> { self.archive.preflight().await }

  /// Downloads every paper the archive lists for the years in `range`.
  ///
  /// # Errors
  ///
  /// Fails before any download starts if the archive lists no years, if `range` doesn't fit the
  /// listed years, if an existing metadata store has other columns than this run writes, or if
  /// the download directory can't be created. Per-paper failures are reported in the returned
  /// [`RunReport`] instead.
  pub async fn run(&self, range: YearRange) -> Result<RunReport> {
    let index = self.archive.year_index().await;
    let bounds = index.bounds().ok_or(HarvesterError::NoYearsFound)?;
    range.validate(bounds)?;
    self.metadata.check_layout().await?;
    tokio::fs::create_dir_all(&self.config.download_dir).await?;
    info!(
      "Harvesting {range} from {} into {:?}",
      self.archive.base_url(),
      self.config.download_dir
    );

    let mut tasks = JoinSet::new();
    let mut seen = HashSet::new();
    let mut file_names = FileNames::default();
    for link in index.iter().filter(|link| range.contains(link.year)) {
      if self.stop.is_stopped() {
        break;
      }

      let mut year_tasks = Vec::new();
      for entry in self.archive.paper_entries(link).await {
        if !seen.insert((link.year, entry.title.clone())) {
          warn!("Dropping duplicate paper \"{}\" ({})", entry.title, link.year);
          continue;
        }
        match DownloadTask::from_entry(self.archive.base_url(), link.year, &entry) {
          Ok(mut task) => {
            file_names.claim(&mut task);
            year_tasks.push(task);
          },
          Err(e) => warn!("Skipping \"{}\" ({}): {e}", entry.title, link.year),
        }
      }

      let year = self.progress.register_year(link.year, year_tasks.len());
      info!("Found {} papers for {}", year_tasks.len(), link.year);
      for task in year_tasks {
        tasks.spawn(self.worker(year.clone()).process(task));
      }
    }

    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(Some(result)) if !result.outcome.is_persisted() => failures.push(result),
        Ok(_) => {},
        Err(e) => warn!("Download task did not finish: {e}"),
      }
    }

    let report =
      RunReport { progress: self.progress.snapshot(), failures, stopped: self.stop.is_stopped() };
    info!(
      "Run finished: {} downloaded, {} failed, {} total{}",
      report.progress.downloaded_papers,
      report.progress.failed_papers,
      report.progress.total_papers,
      if report.stopped { " (stopped)" } else { "" }
    );
    Ok(report)
  }

  /// Everything a task needs, owned so it can be spawned.
  fn worker(&self, year: YearHandle) -> Worker<T> {
    Worker {
      archive: self.archive.clone(),
      fetcher: Arc::clone(&self.fetcher),
      metadata: Arc::clone(&self.metadata),
      permits: Arc::clone(&self.permits),
      stop: self.stop.clone(),
      download_dir: self.config.download_dir.clone(),
      scrape_abstracts: self.config.scrape_abstracts,
      year,
    }
  }
}

/// The per-task share of a [`Harvester`].
struct Worker<T> {
  /// Client used for detail pages
  archive:          Archive<T>,
  /// Client used for PDFs
  fetcher:          Arc<Fetcher<T>>,
  /// Shared metadata store
  metadata:         Arc<MetadataSink>,
  /// Admission permits
  permits:          Arc<Semaphore>,
  /// Cooperative stop
  stop:             StopHandle,
  /// Root of the PDF tree
  download_dir:     PathBuf,
  /// Whether to fetch the abstract
  scrape_abstracts: bool,
  /// Completion handle of the task's year
  year:             YearHandle,
}

impl<T: Transport> Worker<T> {
  /// Runs one task to its terminal state. Returns `None` if it was never admitted.
  async fn process(self, task: DownloadTask) -> Option<DownloadResult> {
    let Ok(_permit) = Arc::clone(&self.permits).acquire_owned().await else {
      debug!("Not admitting \"{}\": run stopped", task.title);
      return None;
    };
    if self.stop.is_stopped() {
      return None;
    }
    trace!("Admitted \"{}\"", task.title);

    let abstract_text = if self.scrape_abstracts {
      Some(self.archive.abstract_text(&task.detail_url).await.unwrap_or_default())
    } else {
      None
    };

    let outcome = match self.fetcher.fetch(&task.pdf_url).await {
      Ok(bytes) => {
        let path = task.file_path(&self.download_dir);
        match persist(path.clone(), bytes).await {
          Ok(()) => Outcome::Persisted { path },
          Err(e) => Outcome::Failed { reason: FailureReason::Persist(e.to_string()) },
        }
      },
      Err(e) => Outcome::Failed { reason: FailureReason::Fetch(e) },
    };
    match &outcome {
      Outcome::Persisted { path } => debug!("Saved \"{}\" to {path:?}", task.title),
      Outcome::Failed { reason } => warn!("Failed to download \"{}\": {reason}", task.title),
    }

    let record =
      MetadataRecord::new(&task.title, task.author.as_str(), task.year, task.pdf_url.as_str())
        .with_abstract(abstract_text);
    if let Err(e) = self.metadata.append(record).await {
      warn!("Failed to record metadata for \"{}\": {e}", task.title);
    }
    if let Err(e) = self.year.complete(outcome.status()) {
      warn!("Failed to record progress for \"{}\": {e}", task.title);
    }

    Some(DownloadResult { year: task.year, title: task.title, outcome })
  }
}

/// Writes `bytes` to `path` through a uniquely named temporary file in the same directory, so
/// `path` only ever holds a complete file.
async fn persist(path: PathBuf, bytes: Vec<u8>) -> std::io::Result<()> {
  tokio::task::spawn_blocking(move || -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut partial =
      tempfile::Builder::new().prefix(".").suffix(".pdf.part").tempfile_in(parent)?;
    partial.write_all(&bytes)?;
    partial.as_file().sync_all()?;
    partial.persist(&path).map_err(|e| e.error)?;
    Ok(())
  })
  .await
  .map_err(std::io::Error::other)?
}
