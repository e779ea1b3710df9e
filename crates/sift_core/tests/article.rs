use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use sift_core::{
    extract_url_content, extract_url_content_blocking, ArticleError, ArticleExtractor,
    ConvertError, Converter, FailureKind, FetchSettings, MarkdownConverter, ReadabilityExtractor,
    ReqwestFetcher, Stage, UrlError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXAMPLE_PAGE: &str = r#"<!doctype html>
<html>
<head>
    <title>Example Domain</title>
    <meta charset="utf-8" />
    <meta http-equiv="Content-type" content="text/html; charset=utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <style type="text/css">
    body { background-color: #f0f0f2; margin: 0; padding: 0; }
    div { width: 600px; margin: 5em auto; padding: 2em; }
    </style>
</head>
<body>
<div>
    <h1>Example Domain</h1>
    <p>This domain is for use in illustrative examples in documents. You may use this
    domain in literature without prior coordination or asking for permission.</p>
    <p><a href="/domains/example">More information...</a></p>
</div>
</body>
</html>
"#;

const EXAMPLE_TEXT: &str = "This domain is for use in illustrative examples in documents. You may use this domain in literature without prior coordination or asking for permission.";

async fn serve(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

#[tokio::test]
async fn static_page_produces_fixed_article() {
    sift_logging::initialize_for_tests();
    let server = serve("/", html(EXAMPLE_PAGE)).await;

    let article = extract_url_content(&format!("{}/", server.uri()))
        .await
        .expect("extraction ok");

    assert_eq!(article.title, "Example Domain");
    assert_eq!(article.author, "");
    assert_eq!(article.published_at, 0);
    assert_eq!(article.modified_at, 0);
    assert_eq!(article.excerpt, EXAMPLE_TEXT);
    assert_eq!(
        article.markdown_content,
        format!(
            "{EXAMPLE_TEXT}\n\n[More information...]({}/domains/example)",
            server.uri()
        )
    );
    assert_eq!(
        article.text_content,
        format!("{EXAMPLE_TEXT}\nMore information...")
    );
    assert_eq!(article.length, article.text_content.chars().count());
    assert!(article
        .html_content
        .starts_with(r#"<div id="readability-page-1" class="page">"#));
    assert!(article
        .html_content
        .contains(r#"<a href="/domains/example">More information...</a>"#));
    assert!(!article.html_content.contains("<h1>"));
    assert!(!article.html_content.contains("background-color"));
    assert_eq!(article.site_name, "");
    assert_eq!(article.image, "");
    assert_eq!(article.favicon, "");
    assert_eq!(article.language, "");
}

#[tokio::test]
async fn repeated_calls_are_identical() {
    let server = serve("/page", html(EXAMPLE_PAGE)).await;
    let url = format!("{}/page", server.uri());

    let extractor = ArticleExtractor::default();
    let first = extractor.extract(&url).await.expect("first call");
    let second = extractor.extract(&url).await.expect("second call");
    assert_eq!(first, second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_extractor_serves_concurrent_callers() {
    let server = serve("/shared", html(EXAMPLE_PAGE)).await;
    let url = format!("{}/shared", server.uri());
    let extractor = Arc::new(ArticleExtractor::default());

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let extractor = Arc::clone(&extractor);
            let url = url.clone();
            tokio::spawn(async move { extractor.extract(&url).await })
        })
        .collect();
    let (a, b) = tokio::join!(extractor.extract(&url), extractor.extract(&url));
    let expected = a.expect("joined call");
    assert_eq!(b.expect("joined call"), expected);

    for task in tasks {
        let article = task.await.expect("task completes").expect("spawned call");
        assert_eq!(article, expected);
    }
    assert_eq!(expected.title, "Example Domain");
}

#[tokio::test]
async fn path_and_query_do_not_affect_link_base() {
    let server = serve("/deep/nested/page", html(EXAMPLE_PAGE)).await;

    let article = extract_url_content(&format!("{}/deep/nested/page?ref=feed#top", server.uri()))
        .await
        .expect("extraction ok");
    assert!(article
        .markdown_content
        .ends_with(&format!("({}/domains/example)", server.uri())));
}

#[tokio::test]
async fn published_metadata_maps_to_epoch_seconds() {
    let prose = "The river crossing, closed since the winter storms, reopened to traffic on Friday after weeks of repairs.";
    let page = format!(
        r#"<html lang="en"><head>
            <title>Old river bridge reopens to traffic</title>
            <meta property="og:site_name" content="Valley Times">
            <meta property="og:image" content="/media/bridge.jpg">
            <script type="application/ld+json">
            {{"@context": "https://schema.org", "@type": "NewsArticle",
              "headline": "Old river bridge reopens to traffic",
              "author": {{"@type": "Person", "name": "Sam Writer"}},
              "datePublished": "2024-03-01T09:15:00Z",
              "dateModified": "2024-03-01T00:00:00Z"}}
            </script>
        </head><body><article><p>{prose}</p><p>{prose}</p></article></body></html>"#
    );
    let server = serve("/news/bridge", html(&page)).await;

    let article = extract_url_content(&format!("{}/news/bridge", server.uri()))
        .await
        .expect("extraction ok");
    assert_eq!(article.title, "Old river bridge reopens to traffic");
    assert_eq!(article.author, "Sam Writer");
    assert_eq!(article.site_name, "Valley Times");
    assert_eq!(article.image, format!("{}/media/bridge.jpg", server.uri()));
    assert_eq!(article.language, "en");
    assert_eq!(article.published_at, 1_709_284_500);
    assert_eq!(article.modified_at, 1_709_251_200);
    assert_eq!(article.markdown_content, format!("{prose}\n\n{prose}"));
}

#[tokio::test]
async fn missing_page_fails_while_fetching() {
    let server = serve("/gone", ResponseTemplate::new(404)).await;

    let err = extract_url_content(&format!("{}/gone", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Fetching);
    assert!(matches!(
        err,
        ArticleError::Fetch(ref fetch) if fetch.kind == FailureKind::HttpStatus(404)
    ));
}

#[tokio::test]
async fn non_html_resources_are_rejected() {
    let server = serve(
        "/data.json",
        ResponseTemplate::new(200).set_body_raw(r#"{"a":1}"#, "application/json"),
    )
    .await;

    let err = extract_url_content(&format!("{}/data.json", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Fetching);
    assert!(matches!(
        err,
        ArticleError::Fetch(ref fetch)
            if matches!(fetch.kind, FailureKind::UnsupportedContentType { .. })
    ));
}

#[tokio::test]
async fn slow_servers_time_out() {
    let server = serve(
        "/slow",
        html(EXAMPLE_PAGE).set_delay(Duration::from_millis(300)),
    )
    .await;
    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };

    let err = ArticleExtractor::new(settings)
        .extract(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.stage(), Stage::Fetching);
}

#[tokio::test]
async fn empty_pages_fail_while_extracting() {
    let server = serve("/empty", html("<html><head><title>Nothing here</title></head><body></body></html>")).await;

    let err = extract_url_content(&format!("{}/empty", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Extracting);
}

struct FailingConverter;

impl Converter for FailingConverter {
    fn to_markdown(&self, _html: &str, _base_url: &str) -> Result<String, ConvertError> {
        Err(ConvertError::TooDeep { limit: 0 })
    }
}

#[tokio::test]
async fn conversion_failures_discard_the_article() {
    let server = serve("/", html(EXAMPLE_PAGE)).await;
    let extractor = ArticleExtractor::with_parts(
        Box::new(ReqwestFetcher::default()),
        Box::new(ReadabilityExtractor),
        Box::new(FailingConverter),
    );

    let err = extractor
        .extract(&format!("{}/", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Converting);
    assert!(matches!(
        err,
        ArticleError::Conversion(ConvertError::TooDeep { limit: 0 })
    ));
}

#[tokio::test]
async fn shallow_nesting_limit_is_reported() {
    let server = serve("/", html(EXAMPLE_PAGE)).await;
    let extractor = ArticleExtractor::with_parts(
        Box::new(ReqwestFetcher::default()),
        Box::new(ReadabilityExtractor),
        Box::new(MarkdownConverter::with_max_depth(1)),
    );

    let err = extractor
        .extract(&format!("{}/", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ArticleError::Conversion(ConvertError::TooDeep { limit: 1 })
    ));
}

#[tokio::test]
async fn invalid_urls_fail_before_any_request() {
    let err = extract_url_content("ftp://example.com/file").await.unwrap_err();
    assert_eq!(err.stage(), Stage::Validating);
    assert!(matches!(
        err,
        ArticleError::Url(UrlError::UnsupportedScheme(ref scheme)) if scheme == "ftp"
    ));

    let err = extract_url_content("not a url").await.unwrap_err();
    assert!(matches!(err, ArticleError::Url(UrlError::Parse(_))));
}

#[test]
fn blocking_entry_point_matches_async_one() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(serve("/", html(EXAMPLE_PAGE)));
    let url = format!("{}/", server.uri());

    let blocking = extract_url_content_blocking(&url).expect("blocking extraction ok");
    let asynchronous = runtime
        .block_on(extract_url_content(&url))
        .expect("async extraction ok");
    assert_eq!(blocking, asynchronous);
    assert_eq!(blocking.title, "Example Domain");
}
