//! Deferred scrape pass: fetch metadata for an item saved with
//! `needs_scraping` and fold the result into its row.

use crate::jobs::handler::JobHandler;
use crate::repositories::{ItemStore, PgItemStore};
use crate::scraper::MetadataScraper;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{Span, info, instrument};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ScrapeItemPayload {
    pub item_id: Uuid,
}

#[derive(Clone)]
pub struct ScrapeItemJobHandler {
    scraper: Arc<dyn MetadataScraper>,
}

impl ScrapeItemJobHandler {
    pub fn new(scraper: Arc<dyn MetadataScraper>) -> Self {
        Self { scraper }
    }
}

#[async_trait]
impl JobHandler for ScrapeItemJobHandler {
    #[instrument(skip(self, pool, span), fields(item_id))]
    async fn run(
        &self,
        payload: serde_json::Value,
        pool: &PgPool,
        span: Span,
    ) -> anyhow::Result<()> {
        let payload: ScrapeItemPayload = serde_json::from_value(payload)?;
        span.record("item_id", tracing::field::display(payload.item_id));

        let store = PgItemStore::new(pool.clone());

        let Some(url) = store.pending_scrape_url(payload.item_id).await? else {
            // Already scraped (a redelivered job) or the item is gone.
            info!("Item {} has no pending scrape, nothing to do", payload.item_id);
            return Ok(());
        };

        info!("Scraping metadata for item {} from {}", payload.item_id, url);

        let Some(scraped) = self.scraper.scrape(&url).await else {
            // Transient by assumption; the queue retries with backoff.
            anyhow::bail!("Scrape yielded nothing for {}", url);
        };

        store.apply_scrape(payload.item_id, &scraped).await?;
        info!("Stored scraped metadata for item {}", payload.item_id);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "scrape_item"
    }
}
