use stashit::scraper::{FetchError, HttpScraper, MetadataScraper, PageFetcher, fetch};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[tokio::test]
async fn test_fetch_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(
                    "<html><head><title>Test</title></head><body>Hello World</body></html>"
                        .as_bytes(),
                )
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/test", mock_server.uri());
    let result = fetch(&url).await.unwrap();

    assert!(result.status.is_success());
    assert!(result.body_utf8.contains("Hello World"));
    assert_eq!(result.url_final.as_str(), url);
}

#[tokio::test]
async fn test_fetch_404_is_not_retriable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/notfound"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let url = format!("{}/notfound", mock_server.uri());
    let result = fetch(&url).await;

    match result {
        Err(FetchError::Http { status, retriable }) => {
            assert_eq!(status.as_u16(), 404);
            assert!(!retriable);
        }
        _ => panic!("Expected HTTP 404 error"),
    }
}

#[tokio::test]
async fn test_fetch_500_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/error"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let url = format!("{}/error", mock_server.uri());
    let result = fetch(&url).await;

    match result {
        Err(FetchError::Http { status, retriable }) => {
            assert_eq!(status.as_u16(), 500);
            assert!(retriable);
            assert!(FetchError::Http { status, retriable }.should_retry());
        }
        _ => panic!("Expected HTTP 500 error"),
    }
}

#[tokio::test]
async fn test_fetch_follows_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/redirect"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/final"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes("<html><body>Final page</body></html>".as_bytes())
                .insert_header("Content-Type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/redirect", mock_server.uri());
    let result = fetch(&url).await.unwrap();

    assert!(result.status.is_success());
    assert!(result.body_utf8.contains("Final page"));
    assert!(result.url_final.as_str().ends_with("/final"));
}

#[tokio::test]
async fn test_fetch_rejects_non_html() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"{\"not\": \"html\"}".as_slice())
                .insert_header("Content-Type", "application/json"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/data.json", mock_server.uri());
    let result = fetch(&url).await;

    match result {
        Err(FetchError::UnsupportedContentType(ct)) => {
            assert!(ct.contains("application/json"));
        }
        _ => panic!("Expected unsupported content type error"),
    }
}

#[tokio::test]
async fn test_fetch_rejects_oversized_body() {
    let mock_server = MockServer::start().await;

    // One byte over the 5MB cap.
    let body = vec![b'x'; 5 * 1024 * 1024 + 1];
    Mock::given(method("GET"))
        .and(path("/huge"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("Content-Type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/huge", mock_server.uri());
    let result = fetch(&url).await;

    assert!(matches!(result, Err(FetchError::BodyTooLarge(_))));
}

#[tokio::test]
async fn test_configured_body_cap_is_enforced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/small-cap"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![b'x'; 200])
                .insert_header("Content-Type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/small-cap", mock_server.uri());

    // A fetcher configured with a 64-byte cap rejects what the default
    // bounds would accept.
    let fetcher = PageFetcher::new(5, 64);
    assert!(matches!(
        fetcher.fetch(&url).await,
        Err(FetchError::BodyTooLarge(_))
    ));
    assert!(fetch(&url).await.is_ok());
}

#[tokio::test]
async fn test_fetch_invalid_url() {
    let result = fetch("not a url at all").await;
    assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
}

#[tokio::test]
async fn test_fetch_decodes_legacy_charset() {
    let mock_server = MockServer::start().await;

    // "café" in windows-1252: 0xE9 for é
    let body: Vec<u8> = b"<html><body>caf\xE9</body></html>".to_vec();
    Mock::given(method("GET"))
        .and(path("/legacy"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(body)
                .insert_header("Content-Type", "text/html; charset=windows-1252"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/legacy", mock_server.uri());
    let result = fetch(&url).await.unwrap();
    assert!(result.body_utf8.contains("café"));
}

#[tokio::test]
async fn test_scraper_extracts_metadata_end_to_end() {
    let mock_server = MockServer::start().await;

    let html = r#"<html>
        <head>
            <title>An Article</title>
            <meta name="description" content="What the article covers">
            <meta property="og:image" content="https://img.test/cover.png">
        </head>
        <body>
            <script>evil()</script>
            <article><p>The <strong>body</strong> text.</p></article>
        </body>
    </html>"#;

    Mock::given(method("GET"))
        .and(path("/article"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(html.as_bytes())
                .insert_header("Content-Type", "text/html; charset=utf-8"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/article", mock_server.uri());
    let result = HttpScraper::new().scrape(&url).await.unwrap();

    assert_eq!(result.title.as_deref(), Some("An Article"));
    assert_eq!(result.description.as_deref(), Some("What the article covers"));
    assert_eq!(result.image.as_deref(), Some("https://img.test/cover.png"));
    let content = result.content.unwrap();
    assert!(content.contains("<strong>body</strong>"));
    assert!(!content.contains("<script>"));
}

#[tokio::test]
async fn test_scraper_degrades_to_none_on_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&mock_server)
        .await;

    let url = format!("{}/gone", mock_server.uri());
    assert!(HttpScraper::new().scrape(&url).await.is_none());
}
