use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// --- PostgreSQL Enums ---

/// The canonical item categories. Exactly one per item, no overlap.
#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(type_name = "item_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Link,
    Note,
    Highlight,
    Image,
    Audio,
    Video,
    Document,
}

impl ItemType {
    /// Lowercase label, used for display-title fallbacks on file items.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Note => "note",
            Self::Highlight => "highlight",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// True for the categories that wrap an uploaded file.
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            Self::Image | Self::Audio | Self::Video | Self::Document
        )
    }
}

#[derive(sqlx::Type, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

/// --- Tables ---

/// A stored item as the persistence layer returns it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StashedItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub highlighted_text: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub tags: Vec<String>,
    pub is_loved: bool,
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scraped_content: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub needs_scraping: bool,
    pub ai_synopsis: Option<String>,
    pub ai_synopsis_title: Option<String>,
    pub ai_synopsis_purpose: Option<String>,
    pub ai_synopsis_structure: Option<String>,
    pub ai_synopsis_key_points: Option<String>,
    pub ai_synopsis_takeaways: Option<String>,
}

/// The canonical record the Canonicalizer produces, ready to hand to the
/// store. The id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub user_id: Uuid,
    pub item_type: ItemType,
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub highlighted_text: Option<String>,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub file_path: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub tags: Vec<String>,
    pub source_id: Option<String>,
    /// Import rows may carry their original save time; `None` lets the
    /// store default to now().
    pub created_at: Option<DateTime<Utc>>,
    pub scraped_content: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub needs_scraping: bool,
}

impl NewItem {
    pub fn new(user_id: Uuid, item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            user_id,
            item_type,
            title: title.into(),
            url: None,
            content: None,
            highlighted_text: None,
            summary: None,
            image_url: None,
            file_path: None,
            file_name: None,
            mime_type: None,
            tags: Vec::new(),
            source_id: None,
            created_at: None,
            scraped_content: None,
            scraped_at: None,
            needs_scraping: false,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub kind: String,               // logical job name
    pub payload: serde_json::Value, // job data as JSONB
    pub run_at: DateTime<Utc>,      // next time the job is eligible
    pub attempts: i32,              // execution attempts so far
    pub max_attempts: i32,          // maximum attempts before giving up
    pub backoff_seconds: i32,       // populated when job fails
    pub status: JobStatus,
    pub last_error: Option<String>,
    pub visibility_till: Option<DateTime<Utc>>, // set while "running"
    pub reserved_by: Option<Uuid>,              // worker instance id
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_labels_are_lowercase() {
        for ty in [
            ItemType::Link,
            ItemType::Note,
            ItemType::Highlight,
            ItemType::Image,
            ItemType::Audio,
            ItemType::Video,
            ItemType::Document,
        ] {
            assert_eq!(ty.label(), ty.label().to_lowercase());
        }
    }

    #[test]
    fn file_categories() {
        assert!(ItemType::Image.is_file());
        assert!(ItemType::Audio.is_file());
        assert!(ItemType::Video.is_file());
        assert!(ItemType::Document.is_file());
        assert!(!ItemType::Link.is_file());
        assert!(!ItemType::Note.is_file());
        assert!(!ItemType::Highlight.is_file());
    }
}
