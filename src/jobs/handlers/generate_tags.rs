//! Tag-suggestion pass: ask the text generator for a short tag list and
//! replace the item's tags with it.

use crate::jobs::handler::JobHandler;
use crate::llm::TextGenerator;
use crate::repositories::{ItemStore, PgItemStore};
use crate::tagging::{build_prompt, extract_tags};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{Span, info, instrument};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct GenerateTagsPayload {
    pub item_id: Uuid,
}

#[derive(Clone)]
pub struct GenerateTagsJobHandler {
    generator: Arc<dyn TextGenerator>,
}

impl GenerateTagsJobHandler {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl JobHandler for GenerateTagsJobHandler {
    #[instrument(skip(self, pool, span), fields(item_id))]
    async fn run(
        &self,
        payload: serde_json::Value,
        pool: &PgPool,
        span: Span,
    ) -> anyhow::Result<()> {
        let payload: GenerateTagsPayload = serde_json::from_value(payload)?;
        span.record("item_id", tracing::field::display(payload.item_id));

        let store = PgItemStore::new(pool.clone());

        let Some(item) = store.get(payload.item_id).await? else {
            anyhow::bail!("Item {} not found", payload.item_id);
        };

        let content = item
            .content
            .or(item.scraped_content)
            .unwrap_or_default();
        let prompt = build_prompt(&item.title, item.url.as_deref().unwrap_or(""), &content);

        let raw = self.generator.generate(&prompt).await?;
        let tags = extract_tags(&raw);

        // An empty extraction would wipe existing tags; treat it as a
        // failed attempt and let the queue retry.
        if tags.is_empty() {
            anyhow::bail!("Generator output carried no usable tags");
        }

        store.apply_tags(payload.item_id, &tags).await?;
        info!(count = tags.len(), "stored suggested tags for item {}", payload.item_id);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "generate_tags"
    }
}
