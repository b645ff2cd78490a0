//! Synopsis pass: prompt the text generator about a saved link and store
//! the structured fields it yields. Re-running replaces the previous
//! synopsis wholesale.

use crate::jobs::handler::JobHandler;
use crate::llm::TextGenerator;
use crate::repositories::{ItemStore, PgItemStore};
use crate::synopsis::{build_prompt, extract_fields};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{Span, info, instrument};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct AiSynopsisPayload {
    pub item_id: Uuid,
    pub url: String,
}

#[derive(Clone)]
pub struct AiSynopsisJobHandler {
    generator: Arc<dyn TextGenerator>,
}

impl AiSynopsisJobHandler {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl JobHandler for AiSynopsisJobHandler {
    #[instrument(skip(self, pool, span), fields(item_id))]
    async fn run(
        &self,
        payload: serde_json::Value,
        pool: &PgPool,
        span: Span,
    ) -> anyhow::Result<()> {
        let payload: AiSynopsisPayload = serde_json::from_value(payload)?;
        span.record("item_id", tracing::field::display(payload.item_id));

        let store = PgItemStore::new(pool.clone());

        if store.get(payload.item_id).await?.is_none() {
            anyhow::bail!("Item {} not found", payload.item_id);
        }

        let prompt = build_prompt(&payload.url);
        // Generator errors bubble up so the queue retries with backoff.
        let raw = self.generator.generate(&prompt).await?;

        // Missing labels come back as empty strings, never an error.
        let fields = extract_fields(&raw);
        store.apply_synopsis(payload.item_id, &raw, &fields).await?;

        info!("Stored synopsis for item {}", payload.item_id);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "ai_synopsis"
    }
}
