//! Batch input rows and tolerant parsing of user-supplied lists.
//!
//! Users hand us either a pasted newline list of URLs or an exported CSV
//! with at least a `url` column and an optional creation-date column under
//! a few spellings. Parsing is forgiving: blank lines are skipped, quoted
//! cells unwrapped, and an unparseable date drops the date, not the row.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

/// One unit of batch import work. Transient; never persisted directly.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportRow {
    pub url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ImportRow {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            created_at: None,
        }
    }
}

/// Parse a pasted one-URL-per-line block.
pub fn parse_url_list(text: &str) -> Vec<ImportRow> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ImportRow::new)
        .collect()
}

/// Parse CSV text with a header row. Header matching is case/format
/// tolerant: `url`/`URL` and `created_at`/`Created At`/`created`.
pub fn parse_csv(text: &str) -> Vec<ImportRow> {
    let mut lines = text.lines();
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };

    let headers: Vec<String> = split_row(header_line)
        .iter()
        .map(|h| h.to_ascii_lowercase().replace([' ', '-'], "_"))
        .collect();
    let url_col = headers.iter().position(|h| h == "url");
    let date_col = headers
        .iter()
        .position(|h| h == "created_at" || h == "created");

    let Some(url_col) = url_col else {
        return Vec::new();
    };

    lines
        .filter_map(|line| {
            if line.trim().is_empty() {
                return None;
            }
            let cells = split_row(line);
            let url = cells.get(url_col)?.trim();
            if url.is_empty() {
                return None;
            }
            let created_at = date_col
                .and_then(|idx| cells.get(idx))
                .and_then(|raw| parse_date(raw));
            Some(ImportRow {
                url: url.to_string(),
                created_at,
            })
        })
        .collect()
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}

/// Accept RFC 3339 plus the date formats spreadsheet exports commonly use.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return parsed.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}
