//! Bounded page fetching for the metadata scraper.
//!
//! A fetcher carries its own reqwest client with hard timeouts and a
//! redirect cap; a hung remote must never stall the save that triggered
//! the scrape. Timeout and body cap come from `Config` in production
//! wiring, with the development defaults below. Bodies are decoded to
//! UTF-8 using the charset from the Content-Type header, a `<meta>`
//! declaration in the first 4KB, or heuristic detection, in that order.

use crate::config::Config;
use crate::scraper::errors::FetchError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tracing::instrument;
use url::Url;

const DEFAULT_MAX_BODY_BYTES: u64 = 5 * 1024 * 1024; // 5MB
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = "StashItBot/0.1 (+https://stashit.example.com)";

static HEADER_CHARSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

static DEFAULT_FETCHER: Lazy<PageFetcher> = Lazy::new(PageFetcher::default);

/// A fetched, UTF-8 decoded page.
#[derive(Debug)]
pub struct PageResponse {
    pub url_final: Url,
    pub status: StatusCode,
    pub body_utf8: String,
    pub fetched_at: DateTime<Utc>,
}

/// HTTP client plus the fetch bounds it enforces.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    max_body_bytes: u64,
}

impl PageFetcher {
    pub fn new(request_timeout_secs: u64, max_body_bytes: u64) -> Self {
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(
                CONNECT_TIMEOUT_SECS.min(request_timeout_secs),
            ))
            .timeout(Duration::from_secs(request_timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                        .parse()
                        .expect("static header value"),
                );
                headers
            })
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            max_body_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.scrape_timeout_secs(), config.scrape_max_body_bytes())
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError> {
        let parsed_url = Url::parse(url)?;

        let response = self
            .client
            .get(parsed_url)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        // Check content length before downloading
        if let Some(content_length) = response.content_length()
            && content_length > self.max_body_bytes
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let final_url = response.url().clone();
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Http {
                status,
                retriable: status.is_server_error(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        // Only HTML is scrapeable; binary responses classify as files upstream.
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        // Re-check after download in case Content-Length was missing.
        if body_bytes.len() as u64 > self.max_body_bytes {
            return Err(FetchError::BodyTooLarge(body_bytes.len() as u64));
        }

        let body_utf8 = decode_body(&body_bytes, &content_type)?;

        Ok(PageResponse {
            url_final: final_url,
            status,
            body_utf8,
            fetched_at: Utc::now(),
        })
    }
}

impl Default for PageFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_MAX_BODY_BYTES)
    }
}

/// Fetch with the default bounds via a shared client.
pub async fn fetch(url: &str) -> Result<PageResponse, FetchError> {
    DEFAULT_FETCHER.fetch(url).await
}

fn decode_body(body_bytes: &Bytes, content_type: &str) -> Result<String, FetchError> {
    let encoding = detect_encoding(content_type, body_bytes);
    let (decoded, _used, had_errors) = encoding.decode(body_bytes);
    if had_errors {
        return Err(FetchError::Charset(format!(
            "failed to decode body as {}",
            encoding.name()
        )));
    }
    Ok(decoded.into_owned())
}

fn detect_encoding(content_type: &str, body_bytes: &[u8]) -> &'static Encoding {
    // 1. Content-Type header
    if let Some(captures) = HEADER_CHARSET_REGEX.captures(content_type)
        && let Some(label) = captures.get(1)
        && let Some(encoding) = Encoding::for_label(label.as_str().as_bytes())
    {
        return encoding;
    }

    // 2. <meta charset> in the first 4KB
    let head = &body_bytes[..body_bytes.len().min(4096)];
    let head_str = String::from_utf8_lossy(head);
    if let Some(captures) = META_CHARSET_REGEX.captures(&head_str)
        && let Some(label) = captures.get(1)
        && let Some(encoding) = Encoding::for_label(label.as_str().as_bytes())
    {
        return encoding;
    }

    // 3. Heuristic detection
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, false);
    detector.guess(None, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_from_content_type_header() {
        let enc = detect_encoding("text/html; charset=utf-8", b"<html></html>");
        assert_eq!(enc, encoding_rs::UTF_8);
    }

    #[test]
    fn encoding_from_meta_tag() {
        let body = b"<html><head><meta charset=\"windows-1252\"></head></html>";
        let enc = detect_encoding("text/html", body);
        assert_eq!(enc, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn header_wins_over_meta() {
        let body = b"<html><head><meta charset=\"shift_jis\"></head></html>";
        let enc = detect_encoding("text/html; charset=utf-8", body);
        assert_eq!(enc, encoding_rs::UTF_8);
    }

    #[test]
    fn decode_utf8_roundtrip() {
        let body = Bytes::from("Hello, 世界!".as_bytes().to_vec());
        let decoded = decode_body(&body, "text/html; charset=utf-8").unwrap();
        assert_eq!(decoded, "Hello, 世界!");
    }

    #[test]
    fn unknown_label_falls_back_to_detection() {
        let enc = detect_encoding("text/html; charset=not-a-charset", b"plain ascii body");
        // ASCII detects as a UTF-8-compatible encoding.
        assert!(encoding_rs::UTF_8 == enc || encoding_rs::WINDOWS_1252 == enc);
    }

    #[test]
    fn fetcher_carries_configured_cap() {
        let fetcher = PageFetcher::new(5, 64);
        assert_eq!(fetcher.max_body_bytes, 64);
        assert_eq!(PageFetcher::default().max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }
}
