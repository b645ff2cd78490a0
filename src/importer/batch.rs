//! Local batch import: a user-supplied list of URLs, each pushed through
//! the Canonicalizer's link branch and persisted.
//!
//! The core robustness property lives here: one bad row is recorded and
//! skipped, never aborting the remaining rows. Rows are processed in input
//! order so CSV date overrides stay attributable in the report.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::canonicalizer::{Canonicalizer, IngestPayload};
use crate::importer::rows::ImportRow;
use crate::repositories::ItemStore;

/// Per-row outcome of a batch run.
#[derive(Debug, Clone)]
pub struct RowOutcome {
    /// The row's URL as supplied, so failures stay attributable.
    pub identifier: String,
    pub success: bool,
    pub item_id: Option<Uuid>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RowOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct BatchImporter {
    canonicalizer: Arc<Canonicalizer>,
    store: Arc<dyn ItemStore>,
    /// Optional bound on processed rows per run.
    max_items: Option<usize>,
}

impl BatchImporter {
    pub fn new(
        canonicalizer: Arc<Canonicalizer>,
        store: Arc<dyn ItemStore>,
        max_items: Option<usize>,
    ) -> Self {
        Self {
            canonicalizer,
            store,
            max_items,
        }
    }

    /// Run the batch sequentially, one outcome per input row.
    pub async fn import_rows(&self, rows: &[ImportRow], user_id: Uuid) -> BatchReport {
        let limit = self.max_items.unwrap_or(rows.len());
        let mut report = BatchReport::default();

        for row in rows.iter().take(limit) {
            let outcome = self.import_row(row, user_id).await;
            if let Some(error) = &outcome.error {
                warn!(url = %row.url, error, "batch row failed");
            }
            report.outcomes.push(outcome);
        }

        info!(
            total = report.outcomes.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch import finished"
        );
        report
    }

    async fn import_row(&self, row: &ImportRow, user_id: Uuid) -> RowOutcome {
        let identifier = row.url.clone();

        // Reject rows that are not absolute URLs before touching the network.
        if let Err(err) = url::Url::parse(row.url.trim()) {
            return RowOutcome {
                identifier,
                success: false,
                item_id: None,
                error: Some(format!("invalid url: {err}")),
            };
        }

        let payload = IngestPayload::from_url(row.url.trim());
        let mut item = match self.canonicalizer.canonicalize(payload, user_id).await {
            Ok(item) => item,
            Err(err) => {
                return RowOutcome {
                    identifier,
                    success: false,
                    item_id: None,
                    error: Some(err.to_string()),
                };
            }
        };
        item.created_at = row.created_at;
        // No deferred pass runs for imported rows; they persist complete
        // rather than waiting on a scrape job nothing will schedule.
        item.needs_scraping = false;

        match self.store.insert(&item).await {
            Ok(stored) => RowOutcome {
                identifier,
                success: true,
                item_id: Some(stored.id),
                error: None,
            },
            Err(err) => RowOutcome {
                identifier,
                success: false,
                item_id: None,
                error: Some(err.to_string()),
            },
        }
    }
}
