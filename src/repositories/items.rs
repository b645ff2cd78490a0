//! Item persistence behind a dependency-injected trait.
//!
//! The ingestion core never reads-then-writes the same item; creation
//! happens once, and later passes (scrape, synopsis) are single-statement
//! updates. Batch dedup is the database's job via the conflict key
//! `(user_id, source_id, item_type)`.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use crate::entities::{NewItem, StashedItem};
use crate::scraper::ScrapeResult;
use crate::synopsis::SynopsisFields;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique/constraint violation on a single insert.
    #[error("persistence conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert one canonical record; the store assigns the id.
    async fn insert(&self, item: &NewItem) -> Result<StashedItem, StoreError>;

    /// Insert many records, silently skipping duplicates on
    /// `(user_id, source_id, item_type)`. Returns rows actually written.
    async fn upsert_batch(&self, items: &[NewItem]) -> Result<u64, StoreError>;

    async fn get(&self, item_id: Uuid) -> Result<Option<StashedItem>, StoreError>;

    /// The url of an item still awaiting its deferred scrape pass.
    async fn pending_scrape_url(&self, item_id: Uuid) -> Result<Option<String>, StoreError>;

    /// Apply a completed scrape and clear `needs_scraping`.
    async fn apply_scrape(&self, item_id: Uuid, scraped: &ScrapeResult) -> Result<(), StoreError>;

    /// Overwrite the six synopsis columns. Idempotent by design: re-running
    /// replaces, never appends.
    async fn apply_synopsis(
        &self,
        item_id: Uuid,
        raw: &str,
        fields: &SynopsisFields,
    ) -> Result<(), StoreError>;

    /// Replace the tag list wholesale.
    async fn apply_tags(&self, item_id: Uuid, tags: &[String]) -> Result<(), StoreError>;
}

const ITEM_COLUMNS: &str = "id, user_id, item_type, title, url, content, highlighted_text, \
     summary, image_url, file_path, file_name, mime_type, tags, is_loved, source_id, \
     created_at, scraped_content, scraped_at, needs_scraping, ai_synopsis, \
     ai_synopsis_title, ai_synopsis_purpose, ai_synopsis_structure, \
     ai_synopsis_key_points, ai_synopsis_takeaways";

#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert(&self, item: &NewItem) -> Result<StashedItem, StoreError> {
        let sql = format!(
            "INSERT INTO stashed_items \
               (user_id, item_type, title, url, content, highlighted_text, summary, \
                image_url, file_path, file_name, mime_type, tags, source_id, created_at, \
                scraped_content, scraped_at, needs_scraping) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, \
                     COALESCE($14, now()), $15, $16, $17) \
             RETURNING {ITEM_COLUMNS}"
        );

        let stored = sqlx::query_as::<_, StashedItem>(&sql)
            .bind(item.user_id)
            .bind(item.item_type)
            .bind(&item.title)
            .bind(&item.url)
            .bind(&item.content)
            .bind(&item.highlighted_text)
            .bind(&item.summary)
            .bind(&item.image_url)
            .bind(&item.file_path)
            .bind(&item.file_name)
            .bind(&item.mime_type)
            .bind(&item.tags)
            .bind(&item.source_id)
            .bind(item.created_at)
            .bind(&item.scraped_content)
            .bind(item.scraped_at)
            .bind(item.needs_scraping)
            .fetch_one(&self.pool)
            .await
            .map_err(classify_insert_error)?;

        Ok(stored)
    }

    async fn upsert_batch(&self, items: &[NewItem]) -> Result<u64, StoreError> {
        if items.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO stashed_items \
               (user_id, item_type, title, url, content, summary, image_url, tags, \
                source_id, created_at, needs_scraping) ",
        );
        builder.push_values(items, |mut row, item| {
            row.push_bind(item.user_id)
                .push_bind(item.item_type)
                .push_bind(&item.title)
                .push_bind(&item.url)
                .push_bind(&item.content)
                .push_bind(&item.summary)
                .push_bind(&item.image_url)
                .push_bind(&item.tags)
                .push_bind(&item.source_id)
                .push_bind(item.created_at.unwrap_or_else(Utc::now))
                .push_bind(item.needs_scraping);
        });
        builder.push(
            " ON CONFLICT (user_id, source_id, item_type) WHERE source_id IS NOT NULL DO NOTHING",
        );

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn get(&self, item_id: Uuid) -> Result<Option<StashedItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM stashed_items WHERE id = $1");
        let item = sqlx::query_as::<_, StashedItem>(&sql)
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn pending_scrape_url(&self, item_id: Uuid) -> Result<Option<String>, StoreError> {
        let url: Option<String> = sqlx::query_scalar(
            "SELECT url FROM stashed_items WHERE id = $1 AND needs_scraping AND url IS NOT NULL",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(url)
    }

    async fn apply_scrape(&self, item_id: Uuid, scraped: &ScrapeResult) -> Result<(), StoreError> {
        // The caller-supplied or URL-derived title stays unless the scrape
        // found a real one.
        sqlx::query(
            "UPDATE stashed_items \
             SET title = COALESCE(NULLIF($2, ''), title), \
                 summary = COALESCE($3, summary), \
                 image_url = COALESCE($4, image_url), \
                 scraped_content = $5, \
                 scraped_at = now(), \
                 needs_scraping = FALSE \
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(scraped.title.as_deref().unwrap_or(""))
        .bind(&scraped.description)
        .bind(&scraped.image)
        .bind(&scraped.content)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_synopsis(
        &self,
        item_id: Uuid,
        raw: &str,
        fields: &SynopsisFields,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE stashed_items \
             SET ai_synopsis = $2, \
                 ai_synopsis_title = $3, \
                 ai_synopsis_purpose = $4, \
                 ai_synopsis_structure = $5, \
                 ai_synopsis_key_points = $6, \
                 ai_synopsis_takeaways = $7 \
             WHERE id = $1",
        )
        .bind(item_id)
        .bind(raw)
        .bind(&fields.title)
        .bind(&fields.purpose)
        .bind(&fields.structure)
        .bind(&fields.key_points)
        .bind(&fields.takeaways)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn apply_tags(&self, item_id: Uuid, tags: &[String]) -> Result<(), StoreError> {
        sqlx::query("UPDATE stashed_items SET tags = $2 WHERE id = $1")
            .bind(item_id)
            .bind(tags)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn classify_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(db_err.to_string());
    }
    StoreError::Database(err)
}
