//! Tag suggestion from AI-generated output.
//!
//! The generator is asked for a small JSON array of tags; when it chats
//! instead of complying, quoted words are salvaged from the prose. Like
//! the synopsis extractor this is pure text-in/list-out and soft-fail:
//! unusable output yields an empty list, never an error.

use once_cell::sync::Lazy;
use regex::Regex;

/// Build the fixed tag-suggestion prompt for an item's visible fields.
pub fn build_prompt(title: &str, url: &str, content: &str) -> String {
    format!(
        "Given the following webpage content, generate 2-3 relevant tags that \
         categorize this content. Return only the tags as a JSON array of \
         strings, nothing else.\n\n\
         Title: {title}\n\
         URL: {url}\n\
         Content: {content}\n\n\
         Example response format: [\"technology\", \"productivity\"]"
    )
}

static QUOTED_WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](\w+)["']"#).unwrap());

/// Extract tags from raw generator output: a JSON string array when the
/// model complied, otherwise any quoted words in the text.
pub fn extract_tags(raw_text: &str) -> Vec<String> {
    if let Ok(tags) = serde_json::from_str::<Vec<String>>(raw_text.trim()) {
        return tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
    }

    QUOTED_WORD_REGEX
        .captures_iter(raw_text)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_json_array() {
        let tags = extract_tags(r#"["rust", "async", "profiling"]"#);
        assert_eq!(tags, vec!["rust", "async", "profiling"]);
    }

    #[test]
    fn salvages_quoted_words_from_prose() {
        let tags = extract_tags(r#"Sure! Here are some tags: "rust" and 'tooling'."#);
        assert_eq!(tags, vec!["rust", "tooling"]);
    }

    #[test]
    fn unusable_output_yields_nothing() {
        assert!(extract_tags("no tags to be found here").is_empty());
        assert!(extract_tags("").is_empty());
    }

    #[test]
    fn blank_json_entries_are_dropped() {
        let tags = extract_tags(r#"["rust", "  ", ""]"#);
        assert_eq!(tags, vec!["rust"]);
    }

    #[test]
    fn prompt_carries_the_item_fields() {
        let prompt = build_prompt("A Title", "https://x.test", "body text");
        assert!(prompt.contains("Title: A Title"));
        assert!(prompt.contains("URL: https://x.test"));
        assert!(prompt.contains("Content: body text"));
        assert!(prompt.contains("JSON array"));
    }
}
