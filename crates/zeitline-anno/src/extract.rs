//! Page extraction — pure parsing of ANNO page-text responses.
//!
//! The annoshow endpoint answers with a bracketed header line,
//! `[yyyy-mm-dd - <issue id> - Seite <n>]`, followed by the page's OCR
//! text. A body that is only the header with a numeric issue id is the
//! archive's "no such page" placeholder, which marks the end of an
//! issue. No I/O here; everything is deterministic on the input.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::issues::Issue;
use crate::record::PageRecord;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*(\d{4}-\d{2}-\d{2})\s*-\s*(\S+)\s*-\s*Seite\s+(\d+)\s*\]")
        .expect("invalid header regex")
});

/// Placeholder the archive serves for a page index past the last page.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*\d{4}-\d{2}-\d{2}\s*-\s*\d{8}\s*-\s*Seite\s+\d+\s*\]$")
        .expect("invalid placeholder regex")
});

/// Successful extraction outcomes.
#[derive(Debug, PartialEq)]
pub enum Extraction {
    Record(PageRecord),
    /// The archive has no page at this index — end of the issue
    NoSuchPage,
}

/// Content was present but the required fields could not be recovered.
/// Reported and skipped; never retried as a transport error.
#[derive(Debug, PartialEq, Eq)]
pub enum ExtractError {
    MissingHeader,
    InvalidDate(String),
    InvalidPage(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "page header not found"),
            Self::InvalidDate(s) => write!(f, "unparseable issue date: {s:?}"),
            Self::InvalidPage(s) => write!(f, "unparseable page index: {s:?}"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract a [`PageRecord`] from a raw annoshow response body.
///
/// Missing OCR text yields a record with empty text; a missing or
/// unparseable header (the carrier of the required date and page
/// fields) yields an [`ExtractError`]. `extracted_at` is passed in so
/// the function stays pure.
pub fn extract(
    raw: &str,
    issue: &Issue,
    extracted_at: DateTime<Utc>,
) -> Result<Extraction, ExtractError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Extraction::NoSuchPage);
    }
    if PLACEHOLDER_RE.is_match(trimmed) {
        return Ok(Extraction::NoSuchPage);
    }

    let caps = HEADER_RE.captures(trimmed).ok_or(ExtractError::MissingHeader)?;
    let date_str = &caps[1];
    let page_str = &caps[3];

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| ExtractError::InvalidDate(date_str.to_string()))?;
    let page: u32 = page_str
        .parse()
        .map_err(|_| ExtractError::InvalidPage(page_str.to_string()))?;
    if page == 0 {
        return Err(ExtractError::InvalidPage(page_str.to_string()));
    }

    let header_end = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let text = trimmed[header_end..].trim().to_string();

    Ok(Extraction::Record(PageRecord {
        title: issue.title.clone(),
        aid: issue.aid.clone(),
        date,
        page,
        text,
        extracted_at,
    }))
}
