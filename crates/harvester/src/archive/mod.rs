//! Discovery of years and papers on a year-indexed archive.
//!
//! An archive exposes two page shapes:
//!
//! - the root page, linking to one index page per publication year, and
//! - a year page, listing one anchor per paper followed by an `<i>` node holding its authors.
//!
//! [`Archive`] fetches these pages through a shared [`Fetcher`] and hands their bodies to the
//! extraction functions in [`extract`]. Page-level failures are logged and produce empty results
//! so that a single unreachable year never aborts a run.

use super::*;

pub mod extract;
pub mod link;

pub use self::{extract::*, link::*};

/// A year and the link to its index page, as found on the archive root page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearLink {
  /// Publication year parsed from the link
  pub year: u16,
  /// The link exactly as found in the page (usually relative)
  pub path: String,
}

/// The years listed on the archive root page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearIndex {
  /// Links in page order, one per year
  links: Vec<YearLink>,
}

impl YearIndex {
  /// Adds a link unless its year is already present. Returns whether it was added.
  pub fn push(&mut self, link: YearLink) -> bool {
    if self.links.iter().any(|existing| existing.year == link.year) {
      return false;
    }
    self.links.push(link);
    true
  }

  /// Iterates the links in page order.
  pub fn iter(&self) -> impl Iterator<Item = &YearLink> { self.links.iter() }

  /// The listed years in page order.
  pub fn years(&self) -> Vec<u16> { self.links.iter().map(|link| link.year).collect() }

  /// The earliest and latest listed years, or `None` if no year is listed.
  pub fn bounds(&self) -> Option<(u16, u16)> {
    let min = self.links.iter().map(|link| link.year).min()?;
    let max = self.links.iter().map(|link| link.year).max()?;
    Some((min, max))
  }

  /// Number of listed years.
  pub fn len(&self) -> usize { self.links.len() }

  /// Whether no year is listed.
  pub fn is_empty(&self) -> bool { self.links.is_empty() }
}

/// One paper as listed on a year page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperEntry {
  /// Paper title with whitespace normalized
  pub title:       String,
  /// Link to the paper's detail page, as found in the page
  pub detail_link: String,
  /// Author list as displayed on the year page
  pub author:      String,
}

/// An inclusive range of publication years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearRange {
  /// First year, inclusive
  pub start: u16,
  /// Last year, inclusive
  pub end:   u16,
}

impl YearRange {
  /// Creates the range `start..=end`. Use [`YearRange::validate`] before relying on it.
  pub fn new(start: u16, end: u16) -> Self { Self { start, end } }

  /// Whether `year` falls in the range.
  pub fn contains(&self, year: u16) -> bool { (self.start..=self.end).contains(&year) }

  /// Checks the range against the archive bounds `(min, max)`.
  ///
  /// # Errors
  ///
  /// - [`HarvesterError::ReversedYearRange`] if `start > end`
  /// - [`HarvesterError::InvalidYearRange`] if `start < min` or `end > max`
  pub fn validate(&self, (min, max): (u16, u16)) -> Result<()> {
    if self.start > self.end {
      return Err(HarvesterError::ReversedYearRange { start: self.start, end: self.end });
    }
    if self.start < min || self.end > max {
      return Err(HarvesterError::InvalidYearRange {
        start: self.start,
        end: self.end,
        min,
        max,
      });
    }
    Ok(())
  }
}

impl Display for YearRange {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}-{}", self.start, self.end)
  }
}

/// Client for the archive's root, year and detail pages.
#[derive(Debug)]
pub struct Archive<T = HttpTransport> {
  /// Base URL every relative link is resolved against
  base_url: String,
  /// Shared retrieval layer
  fetcher:  Arc<Fetcher<T>>,
}

impl<T> Clone for Archive<T> {
  fn clone(&self) -> Self {
    Self { base_url: self.base_url.clone(), fetcher: Arc::clone(&self.fetcher) }
  }
}

impl<T: Transport> Archive<T> {
  /// Creates a client for the archive at `base_url`.
  pub fn new(base_url: impl Into<String>, fetcher: Arc<Fetcher<T>>) -> Self {
    Self { base_url: base_url.into(), fetcher }
  }

  /// The archive base URL.
  pub fn base_url(&self) -> &str { &self.base_url }

  /// Resolves a link found on an archive page.
  pub fn resolve(&self, link: &str) -> Result<String> { absolute_url(&self.base_url, link) }

  /// Checks that the archive root page can be retrieved.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::Unreachable`] if the root page can't be fetched.
  pub async fn preflight(&self) -> Result<()> {
    match self.fetcher.fetch(&self.base_url).await {
      Ok(_) => {
        debug!("{} is reachable", self.base_url);
        Ok(())
      },
      Err(e) =>
        Err(HarvesterError::Unreachable { url: self.base_url.clone(), reason: e.to_string() }),
    }
  }

  /// Fetches the root page and extracts its year links.
  ///
  /// A root page that can't be fetched yields an empty index.
  pub async fn year_index(&self) -> YearIndex {
    match self.fetcher.fetch_text(&self.base_url).await {
      Ok(html) => {
        let index = extract_year_links(&html);
        debug!("Found {} years on {}", index.len(), self.base_url);
        index
      },
      Err(e) => {
        warn!("Failed to fetch the year index: {e}");
        YearIndex::default()
      },
    }
  }

  /// The earliest and latest years the archive lists.
  ///
  /// # Errors
  ///
  /// Returns [`HarvesterError::NoYearsFound`] if the root page lists no years.
  pub async fn year_bounds(&self) -> Result<(u16, u16)> {
    self.year_index().await.bounds().ok_or(HarvesterError::NoYearsFound)
  }

  /// Fetches a year page and extracts its paper entries.
  ///
  /// Entries that can't be parsed are logged and skipped. A page that can't be fetched yields no
  /// entries.
  pub async fn paper_entries(&self, year: &YearLink) -> Vec<PaperEntry> {
    let url = match self.resolve(&year.path) {
      Ok(url) => url,
      Err(e) => {
        warn!("Skipping year {}: {e}", year.year);
        return Vec::new();
      },
    };
    let html = match self.fetcher.fetch_text(&url).await {
      Ok(html) => html,
      Err(e) => {
        warn!("Failed to fetch the paper list for {}: {e}", year.year);
        return Vec::new();
      },
    };

    extract_paper_entries(&html)
      .into_iter()
      .filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
          warn!("Skipping entry on {url}: {e}");
          None
        },
      })
      .collect()
  }

  /// Fetches a detail page and extracts the paper's abstract.
  ///
  /// Returns `None` if the page can't be fetched or holds no abstract.
  pub async fn abstract_text(&self, detail_url: &str) -> Option<String> {
    match self.fetcher.fetch_text(detail_url).await {
      Ok(html) => extract_abstract(&html),
      Err(e) => {
        warn!("Failed to fetch the abstract at {detail_url}: {e}");
        None
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Serves canned pages keyed by URL; anything else is a 404.
  struct PageTransport(Vec<(&'static str, &'static str)>);

  #[async_trait]
  impl Transport for PageTransport {
    async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
      self
        .0
        .iter()
        .find(|(page, _)| *page == url)
        .map(|(_, body)| body.as_bytes().to_vec())
        .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 404 })
    }
  }

  fn archive(pages: Vec<(&'static str, &'static str)>) -> Archive<PageTransport> {
    Archive::new(
      "https://archive.test",
      Arc::new(Fetcher::new(PageTransport(pages), RetryPolicy::default())),
    )
  }

  #[test]
  fn test_year_range_validation() {
    let bounds = (1987, 2023);
    YearRange::new(2022, 2023).validate(bounds).unwrap();
    YearRange::new(1987, 1987).validate(bounds).unwrap();

    assert!(matches!(
      YearRange::new(2023, 2022).validate(bounds),
      Err(HarvesterError::ReversedYearRange { start: 2023, end: 2022 })
    ));
    assert!(matches!(
      YearRange::new(1980, 2000).validate(bounds),
      Err(HarvesterError::InvalidYearRange { min: 1987, max: 2023, .. })
    ));
    assert!(matches!(
      YearRange::new(2020, 2024).validate(bounds),
      Err(HarvesterError::InvalidYearRange { .. })
    ));
  }

  #[test]
  fn test_year_range_contains() {
    let range = YearRange::new(2020, 2022);
    assert!(range.contains(2020) && range.contains(2022));
    assert!(!range.contains(2019) && !range.contains(2023));
    assert_eq!(range.to_string(), "2020-2022");
  }

  #[test]
  fn test_year_index_keeps_first_duplicate() {
    let mut index = YearIndex::default();
    assert!(index.push(YearLink { year: 2023, path: "/a".into() }));
    assert!(!index.push(YearLink { year: 2023, path: "/b".into() }));
    assert_eq!(index.len(), 1);
    assert_eq!(index.iter().next().unwrap().path, "/a");
  }

  #[traced_test]
  #[tokio::test]
  async fn test_preflight_unreachable() {
    let error = archive(vec![]).preflight().await.unwrap_err();
    assert!(matches!(error, HarvesterError::Unreachable { url, .. } if url == "https://archive.test"));
  }

  #[traced_test]
  #[tokio::test]
  async fn test_year_bounds() {
    let archive = archive(vec![(
      "https://archive.test",
      r#"<a href="/paper_files/paper/2021">2021</a><a href="/paper_files/paper/2019">2019</a>"#,
    )]);
    archive.preflight().await.unwrap();
    assert_eq!(archive.year_bounds().await.unwrap(), (2019, 2021));
  }

  #[traced_test]
  #[tokio::test]
  async fn test_year_bounds_without_years() {
    let archive = archive(vec![("https://archive.test", "<p>nothing here</p>")]);
    assert!(matches!(archive.year_bounds().await, Err(HarvesterError::NoYearsFound)));
  }

  #[traced_test]
  #[tokio::test]
  async fn test_paper_entries_skip_broken_entries() {
    let archive = archive(vec![(
      "https://archive.test/paper_files/paper/2021",
      r#"<html><body><div class="container-fluid"><div><ul>
        <li><a href="/paper_files/paper/2021/hash/a-Abstract.html">Kept</a> <i>A. Author</i></li>
        <li><a href="/paper_files/paper/2021/hash/b-Abstract.html">Dropped</a></li>
      </ul></div></div></body></html>"#,
    )]);
    let year = YearLink { year: 2021, path: "/paper_files/paper/2021".into() };

    let entries = archive.paper_entries(&year).await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Kept");
    assert!(logs_contain("Skipping entry"));
  }

  #[traced_test]
  #[tokio::test]
  async fn test_unreachable_year_page_is_empty() {
    let archive = archive(vec![]);
    let year = YearLink { year: 2021, path: "/paper_files/paper/2021".into() };
    assert!(archive.paper_entries(&year).await.is_empty());
    assert!(archive.abstract_text("https://archive.test/hash/x.html").await.is_none());
  }
}
