//! Metadata scraping: fetch a URL and extract title/description/image/
//! favicon plus a sanitized main-content fragment.
//!
//! Any failure — network, status, charset, parse — degrades to `None`.
//! Callers treat `None` as "use fallbacks", never as a hard failure of the
//! surrounding save.

pub mod client;
pub mod errors;
pub mod metadata;

pub use client::{PageFetcher, PageResponse, fetch};
pub use errors::FetchError;
pub use metadata::{ScrapeResult, extract_metadata};

use crate::config::Config;
use async_trait::async_trait;
use tracing::warn;

/// The seam between the decision logic and the network. Mocked in
/// canonicalizer and importer tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Option<ScrapeResult>;
}

/// Production scraper: bounded fetch + selector extraction.
#[derive(Debug, Default, Clone)]
pub struct HttpScraper {
    fetcher: PageFetcher,
}

impl HttpScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch bounds (`SCRAPE_TIMEOUT_SECS`, `SCRAPE_MAX_BODY_BYTES`) from
    /// the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetcher: PageFetcher::from_config(config),
        }
    }
}

#[async_trait]
impl MetadataScraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Option<ScrapeResult> {
        match self.fetcher.fetch(url).await {
            Ok(page) => Some(extract_metadata(&page.body_utf8)),
            Err(err) => {
                warn!(url, error = %err, "scrape failed, caller falls back");
                None
            }
        }
    }
}
