//! Filesystem-safe naming for scraped titles.
//!
//! Every path built from a scraped title goes through [`sanitize_filename`] first. The same
//! sanitized form is what the metadata store records as the paper name.

use super::*;

/// Characters that are replaced with `_` by [`sanitize_filename`].
const FORBIDDEN: [char; 11] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|', '\t', '\n'];

/// Longest single path component most filesystems accept, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// Headroom kept after a stem, enough for a temporary `.pdf.part` extension.
const PARTIAL_SUFFIX: &str = ".pdf.part";

/// Longest file stem (in bytes) produced by [`pdf_filename`], leaving room for
/// [`PARTIAL_SUFFIX`].
pub const MAX_STEM_BYTES: usize = MAX_NAME_BYTES - PARTIAL_SUFFIX.len();

/// Stem used when a title is empty after sanitization.
const UNTITLED: &str = "untitled";

/// Replaces each of `\ / * ? : " < > |`, tab and newline with `_`.
///
/// The replacement is one-for-one, so the output has the same number of characters as the
/// input, and applying it twice gives the same result as applying it once.
///
/// # Examples
///
/// ```
/// use harvester::format::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My/Paper: Draft?"), "My_Paper__Draft_");
/// ```
pub fn sanitize_filename(name: &str) -> String {
  name.chars().map(|c| if FORBIDDEN.contains(&c) { '_' } else { c }).collect()
}

/// Builds the PDF file name for a paper title.
///
/// The title is sanitized, trimmed, truncated on a character boundary to [`MAX_STEM_BYTES`]
/// bytes and suffixed with `.pdf`.
pub fn pdf_filename(title: &str) -> PathBuf { stem_with_suffix(title, "") }

/// Builds the `n`-th alternative PDF file name for a title whose [`pdf_filename`] is taken.
///
/// The ` (n)` marker survives truncation, so different `n` always give different names.
///
/// ```
/// use std::path::PathBuf;
///
/// use harvester::format::numbered_pdf_filename;
///
/// assert_eq!(numbered_pdf_filename("A/B", 2), PathBuf::from("A_B (2).pdf"));
/// ```
pub fn numbered_pdf_filename(title: &str, n: usize) -> PathBuf {
  stem_with_suffix(title, &format!(" ({n})"))
}

/// Sanitized, truncated stem of `title` followed by `marker` and `.pdf`.
fn stem_with_suffix(title: &str, marker: &str) -> PathBuf {
  let sanitized = sanitize_filename(title);
  let budget = MAX_STEM_BYTES.saturating_sub(marker.len());
  let stem = truncate_to_bytes(sanitized.trim(), budget).trim_end();
  let stem = if stem.is_empty() { UNTITLED } else { stem };
  PathBuf::from(format!("{stem}{marker}.pdf"))
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character.
fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
  if text.len() <= max_bytes {
    return text;
  }
  let mut end = max_bytes;
  while !text.is_char_boundary(end) {
    end -= 1;
  }
  &text[..end]
}

/// Collapses runs of whitespace into single spaces and trims both ends.
pub(crate) fn normalize_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}
