//! Ingestion facade: canonicalize, persist, and schedule follow-up work.
//!
//! Follow-up passes (deferred scrape, synopsis) go through the job queue;
//! a queue hiccup never loses the saved item, it only delays enrichment.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::canonicalizer::{Canonicalizer, IngestError, IngestPayload};
use crate::entities::{ItemType, StashedItem};
use crate::importer::{
    BatchImporter, BatchReport, ImportError, ImportRow, PagedSource, SourceImporter, SourceReport,
};
use crate::jobs::JobRepository;
use crate::repositories::{ItemStore, StoreError};

pub const JOB_SCRAPE_ITEM: &str = "scrape_item";
pub const JOB_AI_SYNOPSIS: &str = "ai_synopsis";
pub const JOB_GENERATE_TAGS: &str = "generate_tags";

#[derive(Error, Debug)]
pub enum SaveError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("item {0} not found")]
    NotFound(Uuid),

    #[error("item {0} has no url to summarize")]
    NoUrl(Uuid),

    #[error("failed to enqueue job: {0}")]
    Enqueue(String),
}

/// Enqueue seam, mocked in service tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> anyhow::Result<Uuid>;
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: sqlx::PgPool,
}

impl PgJobQueue {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, kind: &str, payload: serde_json::Value) -> anyhow::Result<Uuid> {
        JobRepository::enqueue(&self.pool, kind, payload, None, None).await
    }
}

pub struct IngestService {
    canonicalizer: Arc<Canonicalizer>,
    store: Arc<dyn ItemStore>,
    jobs: Arc<dyn JobQueue>,
    auto_synopsis: bool,
}

impl IngestService {
    pub fn new(
        canonicalizer: Arc<Canonicalizer>,
        store: Arc<dyn ItemStore>,
        jobs: Arc<dyn JobQueue>,
        auto_synopsis: bool,
    ) -> Self {
        Self {
            canonicalizer,
            store,
            jobs,
            auto_synopsis,
        }
    }

    /// Save one incoming item end to end: canonicalize, persist, then
    /// schedule whatever enrichment the saved shape calls for.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn save_item(
        &self,
        payload: IngestPayload,
        user_id: Uuid,
    ) -> Result<StashedItem, SaveError> {
        let item = self.canonicalizer.canonicalize(payload, user_id).await?;
        let stored = self.store.insert(&item).await?;

        if stored.needs_scraping && stored.url.is_some() {
            self.enqueue_soft(JOB_SCRAPE_ITEM, json!({ "item_id": stored.id }))
                .await;
        }

        if self.auto_synopsis
            && stored.item_type == ItemType::Link
            && let Some(url) = &stored.url
        {
            self.enqueue_soft(JOB_AI_SYNOPSIS, json!({ "item_id": stored.id, "url": url }))
                .await;
        }

        info!(item_id = %stored.id, item_type = ?stored.item_type, "item saved");
        Ok(stored)
    }

    /// Explicitly request a synopsis for an already-saved link.
    #[instrument(skip(self))]
    pub async fn request_synopsis(&self, item_id: Uuid) -> Result<Uuid, SaveError> {
        let item = self
            .store
            .get(item_id)
            .await?
            .ok_or(SaveError::NotFound(item_id))?;
        let url = item.url.ok_or(SaveError::NoUrl(item_id))?;

        self.jobs
            .enqueue(JOB_AI_SYNOPSIS, json!({ "item_id": item_id, "url": url }))
            .await
            .map_err(|e| SaveError::Enqueue(e.to_string()))
    }

    /// Ask the generator to suggest tags for an already-saved item.
    #[instrument(skip(self))]
    pub async fn request_tags(&self, item_id: Uuid) -> Result<Uuid, SaveError> {
        self.store
            .get(item_id)
            .await?
            .ok_or(SaveError::NotFound(item_id))?;

        self.jobs
            .enqueue(JOB_GENERATE_TAGS, json!({ "item_id": item_id }))
            .await
            .map_err(|e| SaveError::Enqueue(e.to_string()))
    }

    /// Run a local batch of URL rows against this service's store.
    pub async fn import_rows(
        &self,
        rows: &[ImportRow],
        user_id: Uuid,
        max_items: Option<usize>,
    ) -> BatchReport {
        let importer = BatchImporter::new(
            Arc::clone(&self.canonicalizer),
            Arc::clone(&self.store),
            max_items,
        );
        importer.import_rows(rows, user_id).await
    }

    /// Drain an external paginated source into this service's store.
    pub async fn import_source(
        &self,
        source: &dyn PagedSource,
        user_id: Uuid,
        chunk_size: usize,
        max_items: Option<usize>,
    ) -> Result<SourceReport, ImportError> {
        let importer = SourceImporter::new(Arc::clone(&self.store), chunk_size, max_items);
        importer.import_source(source, user_id).await
    }

    /// Enqueue where failure must not fail the save that triggered it.
    async fn enqueue_soft(&self, kind: &str, payload: serde_json::Value) {
        if let Err(err) = self.jobs.enqueue(kind, payload).await {
            warn!(kind, error = %err, "enqueue failed, enrichment delayed");
        }
    }
}
