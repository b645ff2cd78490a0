//! Metadata extraction from fetched HTML.
//!
//! Executable and embedded content (`script`, `iframe`, `style`,
//! `noscript`) is stripped from the document before any text or attribute
//! is read, so nothing executable leaks into extracted metadata. The main
//! content fragment is chosen by an ordered selector list and passes
//! through the sanitizer before it is returned.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::sanitizer::sanitize;

/// Ordered preference list for the main content fragment. First non-empty
/// match wins; `<body>` is the last resort.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "[role=\"main\"]",
    ".main-content",
    "#main-content",
    ".post-content",
    ".article-content",
    ".entry-content",
    ".content",
    "main",
];

const ACTIVE_TAGS: &[&str] = &["script", "iframe", "style", "noscript"];

static STRIP_BLOCK_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    ACTIVE_TAGS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b.*?</\s*{tag}\s*>")).unwrap())
        .collect()
});

// A leftover open tag after block removal means the element was never
// closed; the parser would swallow the rest of the document into it.
static STRIP_OPEN_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<(script|iframe|style|noscript)\b[^>]*>").unwrap());

/// What a successful scrape yields. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub favicon: Option<String>,
    /// Sanitized main-content fragment.
    pub content: Option<String>,
}

/// Extract metadata from an HTML document. Never fails: a page with no
/// usable metadata yields a `ScrapeResult` of `None`s.
pub fn extract_metadata(html: &str) -> ScrapeResult {
    let stripped = strip_active_content(html);
    let document = Html::parse_document(&stripped);

    ScrapeResult {
        title: select_text(&document, "title"),
        description: select_attr(&document, "meta[name=\"description\"]", "content"),
        image: select_attr(&document, "meta[property=\"og:image\"]", "content"),
        favicon: select_attr(&document, "link[rel~=\"icon\"]", "href"),
        content: extract_main_content(&document),
    }
}

fn strip_active_content(html: &str) -> String {
    let mut out = html.to_string();
    for re in STRIP_BLOCK_REGEXES.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    if let Some(open) = STRIP_OPEN_TAG_REGEX.find(&out) {
        out.truncate(open.start());
    }
    out
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    for element in document.select(&selector) {
        let text = element.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return Some(text);
        }
    }
    None
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    for element in document.select(&selector) {
        if let Some(value) = element.value().attr(attr) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn extract_main_content(document: &Html) -> Option<String> {
    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                let fragment = element.inner_html();
                if !fragment.trim().is_empty() {
                    let clean = sanitize(&fragment);
                    if !clean.trim().is_empty() {
                        return Some(clean);
                    }
                }
            }
        }
    }

    // Last resort: the whole body.
    let body_selector = Selector::parse("body").ok()?;
    let body = document.select(&body_selector).next()?;
    let clean = sanitize(&body.inner_html());
    if clean.trim().is_empty() {
        None
    } else {
        Some(clean)
    }
}
