//! Allow-list HTML sanitization.
//!
//! Everything that reaches storage or a client passes through here:
//! scraped page fragments, manually submitted content, anything untrusted.
//! The allow-list is structural markup only; no script-execution vector
//! survives, including malformed or unclosed tags (ammonia re-parses and
//! re-serializes, so output is always well-formed). The pass is idempotent.

use ammonia::Builder;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let tags: HashSet<&str> = [
        "h1", "h2", "h3", "h4", "h5", "h6", "p", "a", "img", "ul", "ol", "li", "blockquote",
        "strong", "em", "br", "div", "table", "thead", "tbody", "tr", "th", "td",
    ]
    .into_iter()
    .collect();

    let mut tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::new();
    tag_attributes.insert("a", ["href", "target", "rel"].into_iter().collect());
    tag_attributes.insert("img", ["src", "alt", "title"].into_iter().collect());

    let mut builder = Builder::default();
    builder
        .tags(tags)
        .generic_attributes(HashSet::new())
        .tag_attributes(tag_attributes)
        // `rel` is part of the allow-list; ammonia must not also manage it,
        // or the pass would rewrite its own output.
        .link_rel(None);
    builder
});

/// Strip unsafe markup from arbitrary HTML. Total: always returns a
/// string, degrading to empty for unparsable input.
pub fn sanitize(raw_html: &str) -> String {
    CLEANER.clean(raw_html).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_script_and_style() {
        let out = sanitize(r#"<p>Hello</p><script>alert('xss')</script><style>p{color:red}</style>"#);
        assert!(out.contains("<p>Hello</p>"));
        assert!(!out.contains("script"));
        assert!(!out.contains("alert"));
        assert!(!out.contains("color:red"));
    }

    #[test]
    fn removes_iframes_and_event_handlers() {
        let out = sanitize(r#"<div onclick="evil()"><iframe src="https://x.test"></iframe>ok</div>"#);
        assert!(!out.contains("<iframe"));
        assert!(!out.contains("onclick"));
        assert!(out.contains("ok"));
    }

    #[test]
    fn keeps_allowed_anchor_attributes_only() {
        let out = sanitize(r#"<a href="https://x.test" target="_blank" rel="nofollow" onmouseover="p()">x</a>"#);
        assert!(out.contains(r#"href="https://x.test""#));
        assert!(out.contains(r#"target="_blank""#));
        assert!(out.contains(r#"rel="nofollow""#));
        assert!(!out.contains("onmouseover"));
    }

    #[test]
    fn keeps_allowed_image_attributes_only() {
        let out = sanitize(r#"<img src="a.png" alt="pic" title="t" width="600" onerror="p()">"#);
        assert!(out.contains(r#"src="a.png""#));
        assert!(out.contains(r#"alt="pic""#));
        assert!(!out.contains("width"));
        assert!(!out.contains("onerror"));
    }

    #[test]
    fn handles_malformed_input() {
        // Unclosed tags and a script hidden inside a broken attribute.
        let out = sanitize(r#"<div><p>text<script>bad()<img src=x onerror="p()"#);
        assert!(!out.contains("<script"));
        assert!(!out.contains("onerror"));
    }

    #[test]
    fn empty_and_textless_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("<script>only()</script>"), "");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            r#"<p>Hello <strong>world</strong></p>"#,
            r#"<a href="/x" target="_blank">x</a><script>p()</script>"#,
            r#"<table><tr><td>cell</td></tr></table>"#,
            r#"plain text, no markup"#,
            r#"<div><p>unclosed"#,
        ];
        for html in samples {
            let once = sanitize(html);
            assert_eq!(sanitize(&once), once, "not idempotent for {html:?}");
        }
    }
}
