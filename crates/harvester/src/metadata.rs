//! Append-only metadata store.
//!
//! Every paper a run attempts produces exactly one [`MetadataRecord`], whether or not its PDF was
//! downloaded. Records go to a single file through a [`MetadataSink`], which may be shared by
//! any number of concurrent tasks.
//!
//! Two layouts are supported:
//!
//! - [`MetadataFormat::Csv`]: a header row `paper_name,author,year,pdf_link` (plus `abstract`
//!   when abstracts are scraped) followed by one row per paper
//! - [`MetadataFormat::JsonLines`]: one JSON object per line with the same field names, no header
//!
//! An existing file is never truncated: the header is only written when the file is new or empty,
//! so consecutive runs accumulate into the same store. A CSV store whose header differs from the
//! columns a sink writes (say, a store without abstracts reopened with abstracts) is refused with
//! [`HarvesterError::MetadataLayout`] rather than extended with rows of another width.

use std::{
  fs::{File, OpenOptions},
  io::Write,
  sync::PoisonError,
};

use super::*;

/// Columns of a CSV store without abstracts.
const CSV_HEADER: [&str; 4] = ["paper_name", "author", "year", "pdf_link"];

/// Extra column of a CSV store with abstracts.
const ABSTRACT_COLUMN: &str = "abstract";

/// On-disk layout of the metadata store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataFormat {
  /// Comma separated values with a header row
  #[default]
  #[serde(rename = "csv")]
  Csv,
  /// One JSON object per line
  #[serde(rename = "jsonl")]
  JsonLines,
}

impl FromStr for MetadataFormat {
  type Err = HarvesterError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "csv" => Ok(Self::Csv),
      "jsonl" | "jsonlines" => Ok(Self::JsonLines),
      other => Err(HarvesterError::Config(format!(
        "unknown metadata format \"{other}\", expected \"csv\" or \"jsonl\""
      ))),
    }
  }
}

impl Display for MetadataFormat {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Csv => write!(f, "csv"),
      Self::JsonLines => write!(f, "jsonl"),
    }
  }
}

/// Metadata of one attempted paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
  /// Sanitized paper title
  pub paper_name:    String,
  /// Author list as listed on the year page
  pub author:        String,
  /// Publication year
  pub year:          u16,
  /// Absolute URL of the PDF
  pub pdf_link:      String,
  /// Abstract text, present only when abstracts are scraped
  #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
  pub abstract_text: Option<String>,
}

impl MetadataRecord {
  /// Creates a record, sanitizing `title` the same way file names are.
  pub fn new(
    title: &str,
    author: impl Into<String>,
    year: u16,
    pdf_link: impl Into<String>,
  ) -> Self {
    Self {
      paper_name: sanitize_filename(title),
      author: author.into(),
      year,
      pdf_link: pdf_link.into(),
      abstract_text: None,
    }
  }

  /// Attaches an abstract.
  pub fn with_abstract(mut self, abstract_text: Option<String>) -> Self {
    self.abstract_text = abstract_text;
    self
  }

  /// The CSV fields of this record.
  fn csv_row(&self, include_abstract: bool) -> Vec<String> {
    let mut row = vec![
      self.paper_name.clone(),
      self.author.clone(),
      self.year.to_string(),
      self.pdf_link.clone(),
    ];
    if include_abstract {
      row.push(self.abstract_text.clone().unwrap_or_default());
    }
    row
  }
}

/// Concurrent, append-only writer for [`MetadataRecord`]s.
///
/// The file is opened lazily on the first append. Writes are serialized by a mutex and run as
/// blocking tasks on the runtime handle given to [`MetadataSink::new`].
#[derive(Debug)]
pub struct MetadataSink {
  /// Runtime the blocking writes are spawned on
  runtime: tokio::runtime::Handle,
  /// File state shared with in-flight writes
  inner:   Arc<Mutex<SinkInner>>,
}

/// Mutable state behind the [`MetadataSink`] mutex.
#[derive(Debug)]
struct SinkInner {
  /// Location of the store
  path:             PathBuf,
  /// Layout of the store
  format:           MetadataFormat,
  /// Whether CSV rows carry the abstract column
  include_abstract: bool,
  /// Open handle, once the first record was written
  file:             Option<File>,
}

impl MetadataSink {
  /// Creates a sink writing to `path`. Nothing touches the filesystem until the first append.
  pub fn new(
    path: impl AsRef<Path>,
    format: MetadataFormat,
    include_abstract: bool,
    runtime: tokio::runtime::Handle,
  ) -> Self {
    let inner = SinkInner {
      path: path.as_ref().to_path_buf(),
      format,
      include_abstract,
      file: None,
    };
    Self { runtime, inner: Arc::new(Mutex::new(inner)) }
  }

  /// Checks that an existing store can take this sink's records.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::MetadataLayout`] if a non-empty CSV store has a different header,
  /// or an I/O error if the store exists but can't be read.
  pub async fn check_layout(&self) -> Result<()> {
    let inner = Arc::clone(&self.inner);
    self
      .runtime
      .spawn_blocking(move || inner.lock().unwrap_or_else(PoisonError::into_inner).check_layout())
      .await?
  }

  /// Appends one record and flushes it.
  ///
  /// # Errors
  ///
  /// Fails if the store can't be opened or written, or if the blocking write task panicked.
  pub async fn append(&self, record: MetadataRecord) -> Result<()> {
    let inner = Arc::clone(&self.inner);
    self
      .runtime
      .spawn_blocking(move || {
        let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.write(&record)
      })
      .await?
  }
}

impl SinkInner {
  /// Columns of the CSV rows this sink writes.
  fn header(&self) -> Vec<&'static str> {
    let mut header = CSV_HEADER.to_vec();
    if self.include_abstract {
      header.push(ABSTRACT_COLUMN);
    }
    header
  }

  /// Compares the header of an existing CSV store with [`SinkInner::header`].
  fn check_layout(&self) -> Result<()> {
    if self.format != MetadataFormat::Csv {
      return Ok(());
    }
    let file = match File::open(&self.path) {
      Ok(file) => file,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
      Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(file);
    let mut found = csv::StringRecord::new();
    if !reader.read_record(&mut found)? {
      return Ok(());
    }
    let expected = self.header();
    if found.iter().eq(expected.iter().copied()) {
      return Ok(());
    }
    Err(HarvesterError::MetadataLayout {
      path:     self.path.clone(),
      found:    found.iter().collect::<Vec<_>>().join(","),
      expected: expected.join(","),
    })
  }

  /// Opens the store in append mode, writing the header if the file is empty.
  fn open(&self) -> Result<File> {
    self.check_layout()?;
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;

    if file.metadata()?.len() == 0 && self.format == MetadataFormat::Csv {
      let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&mut file);
      writer.write_record(self.header())?;
      writer.flush()?;
    }
    debug!("Opened metadata store {:?} ({})", self.path, self.format);
    Ok(file)
  }

  /// Writes one record, opening the store first if needed.
  fn write(&mut self, record: &MetadataRecord) -> Result<()> {
    let file = match self.file.take() {
      Some(file) => file,
      None => self.open()?,
    };
    let file = self.file.insert(file);

    match self.format {
      MetadataFormat::Csv => {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(&mut *file);
        writer.write_record(record.csv_row(self.include_abstract))?;
        writer.flush()?;
      },
      MetadataFormat::JsonLines => {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.flush()?;
      },
    }
    trace!("Recorded metadata for {}", record.paper_name);
    Ok(())
  }
}
