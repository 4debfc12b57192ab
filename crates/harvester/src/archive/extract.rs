//! HTML extraction for the two archive page shapes and the paper detail page.
//!
//! All functions here are synchronous and take the page body as a string. The parsed document
//! never leaves the function, so callers are free to hold the results across `.await` points.

use scraper::{ElementRef, Html, Selector};

use super::*;

lazy_static! {
  /// Year links look like `/paper_files/paper/2023`, possibly absolute or with a trailing slash.
  static ref YEAR_LINK: Regex = Regex::new(r"(?:^|/)paper_files/paper/(\d+)/?$").unwrap();
  /// Every anchor carrying a link target.
  static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
  /// Paper anchors on a year page.
  static ref PAPER_ANCHOR: Selector =
    Selector::parse("body > div.container-fluid > div > ul > li a").unwrap();
  /// Section headings on a detail page.
  static ref HEADING: Selector = Selector::parse("h4").unwrap();
  /// Positional location of the abstract paragraph on older detail pages.
  static ref ABSTRACT_FALLBACK: Selector =
    Selector::parse("body > div.container-fluid > div > p:nth-child(9)").unwrap();
}

/// Collects the year links of an archive root page.
///
/// Anchors whose `href` doesn't end in `paper_files/paper/<year>` are ignored, as are years
/// that don't fit in a `u16`. Page order is preserved; a repeated year keeps its first link.
///
/// # Examples
///
/// ```
/// use harvester::archive::extract_year_links;
///
/// let html = r#"<ul>
///   <li><a href="/paper_files/paper/2023">NeurIPS 2023</a></li>
///   <li><a href="/admin/login">Log in</a></li>
///   <li><a href="/paper_files/paper/2022">NeurIPS 2022</a></li>
/// </ul>"#;
/// assert_eq!(extract_year_links(html).years(), vec![2023, 2022]);
/// ```
pub fn extract_year_links(html: &str) -> YearIndex {
  let document = Html::parse_document(html);
  let mut index = YearIndex::default();

  for anchor in document.select(&ANCHOR) {
    let Some(href) = anchor.value().attr("href") else { continue };
    let Some(captures) = YEAR_LINK.captures(href.trim()) else {
      trace!("Ignoring non-year link {href}");
      continue;
    };
    match captures[1].parse::<u16>() {
      Ok(year) =>
        if !index.push(YearLink { year, path: href.trim().to_string() }) {
          debug!("Duplicate link for year {year}: {href}");
        },
      Err(e) => debug!("Ignoring year link {href}: {e}"),
    }
  }

  index
}

/// Collects the paper entries of a year page.
///
/// Each entry is the text and `href` of an anchor in the paper list, plus the text of the first
/// `<i>` element following the anchor among its siblings, which holds the authors. Entries that
/// lack either part come back as errors so the caller can skip them without losing the rest of
/// the page.
pub fn extract_paper_entries(html: &str) -> Vec<Result<PaperEntry>> {
  let document = Html::parse_document(html);

  document
    .select(&PAPER_ANCHOR)
    .map(|anchor| {
      let title = normalize_whitespace(&anchor.text().collect::<String>());
      let Some(detail_link) = anchor.value().attr("href").map(str::trim) else {
        return Err(HarvesterError::MissingLink(title));
      };
      let author = anchor
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == "i")
        .map(|node| normalize_whitespace(&node.text().collect::<String>()));

      match author {
        Some(author) => Ok(PaperEntry { title, detail_link: detail_link.to_string(), author }),
        None => Err(HarvesterError::MissingAuthor(title)),
      }
    })
    .collect()
}

/// Extracts the abstract from a paper detail page.
///
/// The abstract is the first non-empty paragraph following the `Abstract` heading. Pages without
/// that heading fall back to the ninth child of the content container. Returns `None` when
/// neither yields any text.
pub fn extract_abstract(html: &str) -> Option<String> {
  let document = Html::parse_document(html);

  let after_heading = document
    .select(&HEADING)
    .find(|heading| normalize_whitespace(&heading.text().collect::<String>()) == "Abstract")
    .and_then(|heading| {
      heading
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .take_while(|sibling| sibling.value().name() == "p")
        .map(|paragraph| normalize_whitespace(&paragraph.text().collect::<String>()))
        .find(|text| !text.is_empty())
    });

  after_heading.or_else(|| {
    document
      .select(&ABSTRACT_FALLBACK)
      .next()
      .map(|paragraph| normalize_whitespace(&paragraph.text().collect::<String>()))
      .filter(|text| !text.is_empty())
  })
}
