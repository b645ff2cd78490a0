pub mod ai_synopsis;
pub mod generate_tags;
pub mod scrape_item;

pub use ai_synopsis::{AiSynopsisJobHandler, AiSynopsisPayload};
pub use generate_tags::{GenerateTagsJobHandler, GenerateTagsPayload};
pub use scrape_item::{ScrapeItemJobHandler, ScrapeItemPayload};
