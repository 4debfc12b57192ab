//! Derivation of download URLs from detail-page links.

use url::Url;

use super::*;

/// Path segment identifying a paper's detail (abstract) page.
pub const DETAIL_MARKER: &str = "/hash/";

/// Path segment identifying a paper's binary resources.
pub const DOWNLOAD_MARKER: &str = "/file/";

/// Maps a detail-page path to the path of its PDF.
///
/// The [`DETAIL_MARKER`] segment becomes [`DOWNLOAD_MARKER`], `Abstract` becomes `Paper` in the
/// terminal file name, and a trailing `.html` becomes `.pdf`. A path without the marker is
/// returned unchanged so callers can notice the unexpected shape instead of receiving an error.
///
/// # Examples
///
/// ```
/// use harvester::archive::derive_download_url;
///
/// assert_eq!(
///   derive_download_url("/paper_files/paper/2023/hash/0a1b-Abstract-Conference.html"),
///   "/paper_files/paper/2023/file/0a1b-Paper-Conference.pdf"
/// );
/// assert_eq!(derive_download_url("/about.html"), "/about.html");
/// ```
pub fn derive_download_url(detail_link: &str) -> String {
  let Some(marker) = detail_link.rfind(DETAIL_MARKER) else {
    return detail_link.to_string();
  };

  let prefix = &detail_link[..marker];
  let file = detail_link[marker + DETAIL_MARKER.len()..].replace("Abstract", "Paper");
  let file = match file.strip_suffix(".html") {
    Some(stem) => format!("{stem}.pdf"),
    None => file,
  };
  format!("{prefix}{DOWNLOAD_MARKER}{file}")
}

/// Resolves an href found on an archive page against the archive base URL.
///
/// Follows the usual relative-reference rules, so absolute, protocol-relative, root-relative and
/// dot-relative links all resolve the way a browser would resolve them.
///
/// # Errors
///
/// Returns [`HarvesterError::InvalidLink`] if `base_url` isn't an absolute URL or if `link` can't
/// be joined onto it.
pub fn absolute_url(base_url: &str, link: &str) -> Result<String> {
  let invalid = |source: url::ParseError| HarvesterError::InvalidLink {
    base: base_url.to_string(),
    link: link.to_string(),
    source,
  };
  let base = Url::parse(base_url).map_err(invalid)?;
  Ok(base.join(link).map_err(invalid)?.into())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_derive_conference_track() {
    assert_eq!(
      derive_download_url(
        "/paper_files/paper/2023/hash/0001a2b3c4d5e6f7-Abstract-Conference.html"
      ),
      "/paper_files/paper/2023/file/0001a2b3c4d5e6f7-Paper-Conference.pdf"
    );
  }

  #[test]
  fn test_derive_legacy_layout() {
    assert_eq!(
      derive_download_url("/paper_files/paper/1987/hash/02e74f10e0327ad868d138f2b4fdd6f0-Abstract.html"),
      "/paper_files/paper/1987/file/02e74f10e0327ad868d138f2b4fdd6f0-Paper.pdf"
    );
  }

  #[test]
  fn test_derive_absolute_link() {
    assert_eq!(
      derive_download_url("https://papers.nips.cc/paper_files/paper/2022/hash/abc-Abstract-Datasets_and_Benchmarks.html"),
      "https://papers.nips.cc/paper_files/paper/2022/file/abc-Paper-Datasets_and_Benchmarks.pdf"
    );
  }

  #[test]
  fn test_derive_only_touches_file_name() {
    // "Abstract" outside the file name stays put
    assert_eq!(
      derive_download_url("/Abstract/paper/hash/x-Abstract.html"),
      "/Abstract/paper/file/x-Paper.pdf"
    );
  }

  #[test]
  fn test_derive_passes_malformed_links_through() {
    for link in ["", "/paper_files/paper/2023", "/paper_files/paper/2023/file/x-Paper.pdf"] {
      assert_eq!(derive_download_url(link), link);
    }
  }

  #[test]
  fn test_absolute_url() {
    let base = "https://papers.nips.cc";
    assert_eq!(
      absolute_url(base, "/paper_files/paper/2023").unwrap(),
      "https://papers.nips.cc/paper_files/paper/2023"
    );
    assert_eq!(
      absolute_url("https://papers.nips.cc/", "paper_files/paper/2023").unwrap(),
      "https://papers.nips.cc/paper_files/paper/2023"
    );
    assert_eq!(absolute_url(base, "http://mirror.test/x.pdf").unwrap(), "http://mirror.test/x.pdf");
  }

  #[test]
  fn test_absolute_url_relative_forms() {
    assert_eq!(
      absolute_url("https://papers.nips.cc", "//cdn.test/x.pdf").unwrap(),
      "https://cdn.test/x.pdf"
    );
    assert_eq!(
      absolute_url("https://papers.nips.cc/paper_files/", "../x.html").unwrap(),
      "https://papers.nips.cc/x.html"
    );
    assert_eq!(
      absolute_url("http://127.0.0.1:4321", "paper_files/paper/2023/").unwrap(),
      "http://127.0.0.1:4321/paper_files/paper/2023/"
    );
  }

  #[test]
  fn test_absolute_url_rejects_relative_base() {
    let error = absolute_url("papers.nips.cc", "/paper_files/paper/2023").unwrap_err();
    assert!(matches!(
      error,
      HarvesterError::InvalidLink { ref link, .. } if link == "/paper_files/paper/2023"
    ));
  }
}
