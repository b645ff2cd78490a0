//! The central decision engine: turn a loosely-typed, source-specific
//! payload into one canonical `NewItem`.
//!
//! The priority order is fixed and encodes the product's intent:
//! attachments beat links beat free text. A payload with none of the three
//! is a caller error, not an ingestion decision.

use std::sync::Arc;

use chrono::Utc;
use linkify::{LinkFinder, LinkKind};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::classifier::classify;
use crate::entities::{ItemType, NewItem};
use crate::scraper::MetadataScraper;

/// Maximum note-title length derived from content, in characters.
const NOTE_TITLE_CHARS: usize = 60;

const UNTITLED: &str = "Untitled";

/// The inbound payload shape shared by manual saves, the Telegram webhook,
/// and batch rows. Any subset of fields may be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestPayload {
    pub content: Option<String>,
    pub url: Option<String>,
    pub file_url: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub title: Option<String>,
}

impl IngestPayload {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// Payload carried neither a file reference, a URL, a detectable URL
    /// inside free text, nor content.
    #[error("payload has no file, url, or content")]
    NoContent,
}

/// Whether link saves scrape inline or defer enrichment to a background
/// pass, leaving the item visible immediately with `needs_scraping` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeMode {
    Inline,
    Deferred,
}

pub struct Canonicalizer {
    scraper: Arc<dyn MetadataScraper>,
    mode: ScrapeMode,
}

impl Canonicalizer {
    pub fn new(scraper: Arc<dyn MetadataScraper>, mode: ScrapeMode) -> Self {
        Self { scraper, mode }
    }

    /// Resolve the item type and assemble the canonical record.
    /// Post-condition: the returned title is never empty.
    pub async fn canonicalize(
        &self,
        payload: IngestPayload,
        user_id: Uuid,
    ) -> Result<NewItem, IngestError> {
        // 1. Attachments win.
        if payload.file_path.is_some() || payload.file_url.is_some() {
            return Ok(self.file_item(payload, user_id));
        }

        // 2. Explicit URL, or one detected inside free text.
        let explicit_url = payload.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        let detected_url = match explicit_url {
            Some(_) => None,
            None => payload.content.as_deref().and_then(detect_url),
        };
        if let Some(url) = explicit_url.map(str::to_string).or(detected_url) {
            return Ok(self.link_item(payload, user_id, url).await);
        }

        // 3. Free text becomes a note.
        if let Some(content) = payload.content.as_deref().filter(|c| !c.trim().is_empty()) {
            return Ok(note_item(&payload, user_id, content));
        }

        Err(IngestError::NoContent)
    }

    fn file_item(&self, payload: IngestPayload, user_id: Uuid) -> NewItem {
        let file_name = payload.file_name.as_deref().unwrap_or("");
        let mime_type = payload.mime_type.as_deref().unwrap_or("");
        let category = classify(file_name, mime_type);
        debug!(file_name, mime_type, category = category.label(), "classified file payload");

        // Fallback chain: file name, then the category label. The label is
        // always non-empty, so the title invariant holds.
        let title = non_empty(payload.file_name.as_deref())
            .map(str::to_string)
            .unwrap_or_else(|| category.label().to_string());

        let mut item = NewItem::new(user_id, category, title);
        // A remote file_url with no storage path is kept as the file
        // reference; images additionally keep it as a preview URL.
        item.file_path = payload.file_path.clone().or_else(|| payload.file_url.clone());
        item.file_name = payload.file_name;
        item.mime_type = payload.mime_type;
        if category == ItemType::Image {
            item.image_url = payload.file_url;
        }
        item.content = payload.content;
        item
    }

    async fn link_item(&self, payload: IngestPayload, user_id: Uuid, url: String) -> NewItem {
        let scraped = match self.mode {
            ScrapeMode::Inline => self.scraper.scrape(&url).await,
            ScrapeMode::Deferred => None,
        };

        let caller_title = non_empty(payload.title.as_deref()).map(str::to_string);
        let scraped_title = scraped
            .as_ref()
            .and_then(|s| non_empty(s.title.as_deref()).map(str::to_string));
        let title = scraped_title
            .or(caller_title)
            .unwrap_or_else(|| url.clone());

        let mut item = NewItem::new(user_id, ItemType::Link, title);
        item.url = Some(url);
        // The source message is kept verbatim alongside the enriched link.
        item.content = payload.content;

        match self.mode {
            ScrapeMode::Inline => {
                if let Some(scraped) = scraped {
                    item.summary = scraped.description;
                    item.image_url = scraped.image;
                    item.scraped_content = scraped.content;
                    item.scraped_at = Some(Utc::now());
                }
                item.needs_scraping = false;
            }
            ScrapeMode::Deferred => {
                item.needs_scraping = true;
            }
        }
        item
    }
}

fn note_item(payload: &IngestPayload, user_id: Uuid, content: &str) -> NewItem {
    // The caller guarantees non-blank content here, so the derived title
    // is non-empty; `UNTITLED` covers a blank explicit title.
    let title = match non_empty(payload.title.as_deref()) {
        Some(explicit) => explicit.to_string(),
        None => {
            let derived: String = content.trim().chars().take(NOTE_TITLE_CHARS).collect();
            if derived.is_empty() {
                UNTITLED.to_string()
            } else {
                derived
            }
        }
    };

    let mut item = NewItem::new(user_id, ItemType::Note, title);
    // Note bodies are caller-validated structured content, stored as-is.
    item.content = Some(content.to_string());
    item
}

/// First http(s) URL found in free text, if any.
fn detect_url(text: &str) -> Option<String> {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);
    finder
        .links(text)
        .map(|link| link.as_str().to_string())
        .next()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scraper::{MockMetadataScraper, ScrapeResult};

    fn canonicalizer_with(scraper: MockMetadataScraper, mode: ScrapeMode) -> Canonicalizer {
        Canonicalizer::new(Arc::new(scraper), mode)
    }

    fn no_scrape() -> MockMetadataScraper {
        let mut scraper = MockMetadataScraper::new();
        scraper.expect_scrape().returning(|_| None);
        scraper
    }

    fn user() -> Uuid {
        Uuid::new_v4()
    }

    #[tokio::test]
    async fn file_beats_link_beats_note() {
        let payload = IngestPayload {
            content: Some("see https://example.com".into()),
            url: Some("https://example.com".into()),
            file_path: Some("u1/doc.pdf".into()),
            file_name: Some("doc.pdf".into()),
            mime_type: Some("application/pdf".into()),
            ..Default::default()
        };
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Document);
        assert_eq!(item.title, "doc.pdf");
        assert_eq!(item.file_path.as_deref(), Some("u1/doc.pdf"));
        assert_eq!(item.url, None);
    }

    #[tokio::test]
    async fn document_scenario() {
        let payload = IngestPayload {
            file_path: Some("u1/doc.pdf".into()),
            file_name: Some("doc.pdf".into()),
            mime_type: Some("application/pdf".into()),
            ..Default::default()
        };
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Document);
        assert_eq!(item.file_name.as_deref(), Some("doc.pdf"));
        assert_eq!(item.title, "doc.pdf");
    }

    #[tokio::test]
    async fn file_title_falls_back_to_category() {
        let payload = IngestPayload {
            file_url: Some("https://files.test/abc".into()),
            mime_type: Some("image/png".into()),
            ..Default::default()
        };
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Image);
        assert_eq!(item.title, "image");
        // Remote file reference preserved, and usable as a preview.
        assert_eq!(item.file_path.as_deref(), Some("https://files.test/abc"));
        assert_eq!(item.image_url.as_deref(), Some("https://files.test/abc"));
    }

    #[tokio::test]
    async fn link_in_free_text_scenario() {
        let mut scraper = MockMetadataScraper::new();
        scraper.expect_scrape().returning(|_| {
            Some(ScrapeResult {
                title: Some("Example Page".into()),
                description: Some("desc".into()),
                image: Some("http://img".into()),
                ..Default::default()
            })
        });
        let c = canonicalizer_with(scraper, ScrapeMode::Inline);
        let payload = IngestPayload {
            content: Some("check this out https://example.com/a".into()),
            ..Default::default()
        };
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Link);
        assert_eq!(item.url.as_deref(), Some("https://example.com/a"));
        assert_eq!(item.title, "Example Page");
        assert_eq!(item.summary.as_deref(), Some("desc"));
        assert_eq!(item.image_url.as_deref(), Some("http://img"));
        assert_eq!(item.content.as_deref(), Some("check this out https://example.com/a"));
    }

    #[tokio::test]
    async fn scrape_failure_falls_back_to_raw_url() {
        let c = canonicalizer_with(no_scrape(), ScrapeMode::Inline);
        let payload = IngestPayload::from_url("https://unreachable.test/page");
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Link);
        assert_eq!(item.title, "https://unreachable.test/page");
        assert_eq!(item.summary, None);
        assert!(!item.title.is_empty());
    }

    #[tokio::test]
    async fn caller_title_beats_raw_url_when_scrape_fails() {
        let c = canonicalizer_with(no_scrape(), ScrapeMode::Inline);
        let payload = IngestPayload {
            url: Some("https://x.test".into()),
            title: Some("My saved page".into()),
            ..Default::default()
        };
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.title, "My saved page");
    }

    #[tokio::test]
    async fn deferred_mode_skips_scraping() {
        let mut scraper = MockMetadataScraper::new();
        scraper.expect_scrape().never();
        let c = canonicalizer_with(scraper, ScrapeMode::Deferred);
        let payload = IngestPayload::from_url("https://example.com");
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert!(item.needs_scraping);
        assert_eq!(item.title, "https://example.com");
    }

    #[tokio::test]
    async fn note_title_is_first_60_chars() {
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let long = "n".repeat(200);
        let payload = IngestPayload {
            content: Some(long.clone()),
            ..Default::default()
        };
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.item_type, ItemType::Note);
        assert_eq!(item.title.chars().count(), 60);
        assert_eq!(item.content.as_deref(), Some(long.as_str()));
    }

    #[tokio::test]
    async fn note_title_respects_char_boundaries() {
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let payload = IngestPayload {
            content: Some("日本語のメモ".repeat(30)),
            ..Default::default()
        };
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.title.chars().count(), 60);
    }

    #[tokio::test]
    async fn explicit_note_title_wins() {
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let payload = IngestPayload {
            content: Some("body text without any url".into()),
            title: Some("Chosen title".into()),
            ..Default::default()
        };
        let item = c.canonicalize(payload, user()).await.unwrap();
        assert_eq!(item.title, "Chosen title");
    }

    #[tokio::test]
    async fn empty_payload_is_a_caller_error() {
        let c = canonicalizer_with(MockMetadataScraper::new(), ScrapeMode::Inline);
        let result = c.canonicalize(IngestPayload::default(), user()).await;
        assert!(matches!(result, Err(IngestError::NoContent)));

        let whitespace = IngestPayload {
            content: Some("   \n  ".into()),
            url: Some("  ".into()),
            ..Default::default()
        };
        let result = c.canonicalize(whitespace, user()).await;
        assert!(matches!(result, Err(IngestError::NoContent)));
    }

    #[tokio::test]
    async fn type_exclusivity() {
        let c = canonicalizer_with(no_scrape(), ScrapeMode::Inline);

        let link = c
            .canonicalize(IngestPayload::from_url("https://a.test"), user())
            .await
            .unwrap();
        assert_eq!(link.item_type, ItemType::Link);
        assert!(link.url.is_some());
        assert!(link.file_path.is_none());

        let note = c
            .canonicalize(
                IngestPayload {
                    content: Some("just words".into()),
                    ..Default::default()
                },
                user(),
            )
            .await
            .unwrap();
        assert_eq!(note.item_type, ItemType::Note);
        assert!(note.url.is_none());
        assert!(note.file_path.is_none());
        assert!(note.content.is_some());
    }

    #[test]
    fn url_detection() {
        assert_eq!(
            detect_url("look at https://example.com/a and more"),
            Some("https://example.com/a".to_string())
        );
        assert_eq!(detect_url("no links here"), None);
        // First of several wins.
        assert_eq!(
            detect_url("https://first.test then https://second.test"),
            Some("https://first.test".to_string())
        );
    }
}
