//! Structured field extraction from AI-generated synopses.
//!
//! The upstream text generator is asked for five labeled bullet sections,
//! but its output format is not contractually guaranteed. This extractor
//! is deliberately soft-fail: a label with no match yields an empty
//! string, never an error. It is pure text-in/struct-out; the generation
//! call and persistence both live elsewhere.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const LABEL_TITLE: &str = "Article Title and Author";
const LABEL_PURPOSE: &str = "Purpose of the article/post";
const LABEL_STRUCTURE: &str = "Structure or approach taken by the author";
const LABEL_KEY_POINTS: &str = "Key projects, ideas, or sections";
const LABEL_TAKEAWAYS: &str = "Main takeaways or final thoughts";

/// Build the fixed summarization prompt for a URL.
pub fn build_prompt(url: &str) -> String {
    format!(
        "Summarize the content at this URL: {url}\n\n\
         I want the output in a structured bullet format with the following:\n\n\
         - {LABEL_TITLE}\n\
         - {LABEL_PURPOSE}\n\
         - {LABEL_STRUCTURE} (if applicable)\n\
         - {LABEL_KEY_POINTS} (grouped by difficulty or theme if relevant)\n\
         - {LABEL_TAKEAWAYS}\n\n\
         Keep it concise, clear, and easy to skim. Avoid unnecessary filler."
    )
}

/// The five structured fields pulled out of a raw synopsis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynopsisFields {
    pub title: String,
    pub purpose: String,
    pub structure: String,
    pub key_points: String,
    pub takeaways: String,
}

static FIELD_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        LABEL_TITLE,
        LABEL_PURPOSE,
        LABEL_STRUCTURE,
        LABEL_KEY_POINTS,
        LABEL_TAKEAWAYS,
    ]
    .iter()
    .map(|label| {
        // Optional bullet, the label, then a colon/dash separator; the
        // rest of that line is the value.
        Regex::new(&format!(r"(?i)-? ?{}[:\n\-]+([^\n]*)", regex::escape(label))).unwrap()
    })
    .collect()
});

/// Extract the labeled fields from raw generator output.
pub fn extract_fields(raw_text: &str) -> SynopsisFields {
    let mut values = FIELD_REGEXES.iter().map(|re| {
        re.captures(raw_text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    });

    SynopsisFields {
        title: values.next().unwrap_or_default(),
        purpose: values.next().unwrap_or_default(),
        structure: values.next().unwrap_or_default(),
        key_points: values.next().unwrap_or_default(),
        takeaways: values.next().unwrap_or_default(),
    }
}
