//! External paginated import (Pocket-style history).
//!
//! Pages are fetched one at a time and each page is persisted as a
//! complete chunk before the next fetch, bounding memory on arbitrarily
//! large histories. Persistence is an upsert on the composite dedup key
//! `(user_id, source_id, item_type)`, so re-running the import is
//! idempotent.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::{ItemType, NewItem};
use crate::repositories::ItemStore;

const POCKET_GET_URL: &str = "https://getpocket.com/v3/get";
const UNTITLED: &str = "Untitled";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("source api error {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("source response malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ImportError {
    /// The source could not be reached at all (first page failed).
    #[error("source unreachable: {0}")]
    SourceUnreachable(#[source] SourceError),
}

/// One record from the external source, already shape-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source_id: String,
    pub url: String,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A paginated external history. Implementations fetch `count` records
/// starting at `offset`; an empty page is the end signal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PagedSource: Send + Sync {
    async fn fetch_page(&self, offset: usize, count: usize)
        -> Result<Vec<SourceRecord>, SourceError>;
}

/// Outcome of one paginated import run.
#[derive(Debug, Default)]
pub struct SourceReport {
    /// Rows actually written (duplicates skipped by the store don't count).
    pub imported: u64,
    /// Records seen across all fetched pages.
    pub seen: usize,
    /// Complete chunks committed before the run ended.
    pub chunks_committed: usize,
    /// Set when a mid-run page fetch or chunk write failed; everything
    /// counted above is already durable.
    pub aborted: Option<String>,
}

pub struct SourceImporter {
    store: Arc<dyn ItemStore>,
    chunk_size: usize,
    max_items: Option<usize>,
}

impl SourceImporter {
    pub fn new(store: Arc<dyn ItemStore>, chunk_size: usize, max_items: Option<usize>) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            max_items,
        }
    }

    /// Drain the source page by page until the end signal, the item cap,
    /// or a mid-run failure. Only a completely unreachable source is an
    /// `Err`; anything later yields a partial report.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn import_source(
        &self,
        source: &dyn PagedSource,
        user_id: Uuid,
    ) -> Result<SourceReport, ImportError> {
        let mut report = SourceReport::default();
        let mut offset = 0usize;

        loop {
            let remaining = self
                .max_items
                .map(|cap| cap.saturating_sub(report.seen))
                .unwrap_or(self.chunk_size);
            if remaining == 0 {
                info!(cap = ?self.max_items, "import item cap reached");
                break;
            }
            let count = remaining.min(self.chunk_size);

            let page = match source.fetch_page(offset, count).await {
                Ok(page) => page,
                Err(err) if offset == 0 => {
                    return Err(ImportError::SourceUnreachable(err));
                }
                Err(err) => {
                    warn!(offset, error = %err, "page fetch failed mid-run, stopping");
                    report.aborted = Some(err.to_string());
                    break;
                }
            };

            if page.is_empty() {
                break;
            }

            let page_len = page.len();
            report.seen += page_len;

            let items: Vec<NewItem> = page
                .into_iter()
                .map(|record| map_record(record, user_id))
                .collect();

            match self.store.upsert_batch(&items).await {
                Ok(written) => {
                    report.imported += written;
                    report.chunks_committed += 1;
                }
                Err(err) => {
                    warn!(offset, error = %err, "chunk write failed, stopping");
                    report.aborted = Some(err.to_string());
                    break;
                }
            }

            // A short page is also an end signal.
            if page_len < count {
                break;
            }
            offset += page_len;
        }

        info!(
            imported = report.imported,
            seen = report.seen,
            chunks = report.chunks_committed,
            aborted = report.aborted.is_some(),
            "source import finished"
        );
        Ok(report)
    }
}

/// Map an external record into the canonical schema. Imported history is
/// always a link item carrying the source's id for dedup.
fn map_record(record: SourceRecord, user_id: Uuid) -> NewItem {
    let title = record
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut item = NewItem::new(user_id, ItemType::Link, title);
    item.url = Some(record.url);
    item.summary = record.excerpt;
    item.image_url = record.image_url;
    item.source_id = Some(record.source_id);
    item.created_at = record.created_at;
    item
}

/// --- Pocket HTTP client ---

#[derive(Debug, Deserialize)]
struct PocketItem {
    item_id: String,
    given_url: String,
    #[serde(default)]
    resolved_url: Option<String>,
    #[serde(default)]
    given_title: Option<String>,
    #[serde(default)]
    resolved_title: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    top_image_url: Option<String>,
    #[serde(default)]
    time_added: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PocketResponse {
    #[serde(default)]
    list: serde_json::Value,
}

pub struct PocketClient {
    client: reqwest::Client,
    consumer_key: String,
    access_token: String,
    base_url: String,
}

impl PocketClient {
    pub fn new(consumer_key: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            consumer_key: consumer_key.into(),
            access_token: access_token.into(),
            base_url: POCKET_GET_URL.to_string(),
        }
    }

    /// Application credential from configuration plus the user's token.
    pub fn from_config(config: &Config, access_token: impl Into<String>) -> Self {
        Self::new(config.pocket_consumer_key(), access_token)
    }

    /// Point at a non-default endpoint (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn into_records(list: serde_json::Value) -> Result<Vec<SourceRecord>, SourceError> {
        // Pocket returns `list` as an object keyed by item id, or an empty
        // array when there is nothing left.
        let map: HashMap<String, PocketItem> = match list {
            serde_json::Value::Null => HashMap::new(),
            serde_json::Value::Array(entries) if entries.is_empty() => HashMap::new(),
            other => serde_json::from_value(other)
                .map_err(|e| SourceError::Malformed(e.to_string()))?,
        };

        let mut records: Vec<SourceRecord> = map
            .into_values()
            .map(|item| SourceRecord {
                url: item
                    .resolved_url
                    .clone()
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| item.given_url.clone()),
                title: item
                    .resolved_title
                    .clone()
                    .filter(|t| !t.is_empty())
                    .or_else(|| item.given_title.clone().filter(|t| !t.is_empty())),
                excerpt: item.excerpt.clone().filter(|e| !e.is_empty()),
                image_url: item.top_image_url.clone().filter(|u| !u.is_empty()),
                created_at: item
                    .time_added
                    .as_deref()
                    .and_then(|t| t.parse::<i64>().ok())
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                source_id: item.item_id,
            })
            .collect();
        // Stable order within a page keeps chunk writes deterministic.
        records.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(records)
    }
}

#[async_trait]
impl PagedSource for PocketClient {
    #[instrument(skip(self))]
    async fn fetch_page(
        &self,
        offset: usize,
        count: usize,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let params = [
            ("consumer_key", self.consumer_key.as_str()),
            ("access_token", self.access_token.as_str()),
            ("detailType", "complete"),
            ("state", "all"),
            ("sort", "newest"),
            ("offset", &offset.to_string()),
            ("count", &count.to_string()),
        ];

        let response = self
            .client
            .post(&self.base_url)
            .header("X-Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api { status, body });
        }

        let body: PocketResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Self::into_records(body.list)
    }
}
