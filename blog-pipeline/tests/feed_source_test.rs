use blog_pipeline::{FeedSource, FetchConfig, PipelineError, RssFeedSource};
use std::sync::Once;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Engineering Blog</title>
    <link>https://blog.example.com</link>
    <description>Posts</description>
    <item>
      <title>Shipping faster builds</title>
      <link>https://blog.example.com/builds</link>
      <description>How we cut &lt;b&gt;build&lt;/b&gt; times.</description>
      <content:encoded><![CDATA[<p>We cut build times in half.</p><p>Caching did most of the work.</p>]]></content:encoded>
      <pubDate>Tue, 14 May 2024 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Second post</title>
      <link>https://blog.example.com/second</link>
      <description>Only a description here.</description>
    </item>
  </channel>
</rss>"#;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Release Notes</title>
  <id>urn:uuid:60a76c80-d399-11d9-b91C-0003939e0af6</id>
  <updated>2024-05-16T12:00:00Z</updated>
  <entry>
    <title>Version 2.0</title>
    <link href="https://releases.example.com/2.0"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <updated>2024-05-16T12:00:00Z</updated>
    <summary>Version 2.0 is out.</summary>
  </entry>
</feed>"#;

const EMPTY_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Quiet</title><link>https://quiet.example.com</link><description>none</description></channel></rss>"#;

fn fast_config() -> FetchConfig {
    FetchConfig {
        timeout_seconds: 5,
        max_retries: 2,
        retry_delay_seconds: 0,
        ..FetchConfig::default()
    }
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn articles_follow_url_order_then_item_order() {
    init_tracing();
    let server = MockServer::start().await;
    serve(&server, "/atom.xml", 200, ATOM_FEED).await;
    serve(&server, "/rss.xml", 200, RSS_FEED).await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let urls = vec![format!("{}/atom.xml", server.uri()), format!("{}/rss.xml", server.uri())];

    let articles = source.fetch(&urls).await.unwrap();

    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["Version 2.0", "Shipping faster builds", "Second post"]);
    assert_eq!(articles[0].link, "https://releases.example.com/2.0");
    assert_eq!(articles[0].body(), "Version 2.0 is out.");
}

#[tokio::test]
async fn html_is_stripped_and_description_backs_up_content() {
    init_tracing();
    let server = MockServer::start().await;
    serve(&server, "/rss.xml", 200, RSS_FEED).await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let articles = source.fetch(&[format!("{}/rss.xml", server.uri())]).await.unwrap();

    assert_eq!(articles[0].content, "We cut build times in half. Caching did most of the work.");
    assert_eq!(articles[0].description, "How we cut build times.");
    assert_eq!(articles[1].content, "Only a description here.");
}

#[tokio::test]
async fn empty_feed_contributes_nothing() {
    init_tracing();
    let server = MockServer::start().await;
    serve(&server, "/empty.xml", 200, EMPTY_FEED).await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let articles = source.fetch(&[format!("{}/empty.xml", server.uri())]).await.unwrap();

    assert!(articles.is_empty());
}

#[tokio::test]
async fn missing_feed_is_unavailable_without_retries() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let result = source.fetch(&[format!("{}/gone.xml", server.uri())]).await;

    assert!(matches!(result, Err(PipelineError::FeedUnavailable { .. })));
}

#[tokio::test]
async fn server_errors_are_retried_then_reported() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.xml"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let result = source.fetch(&[format!("{}/flaky.xml", server.uri())]).await;

    assert!(matches!(result, Err(PipelineError::FeedUnavailable { .. })));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    init_tracing();
    let server = MockServer::start().await;
    serve(&server, "/broken.xml", 200, "this is not a feed").await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let result = source.fetch(&[format!("{}/broken.xml", server.uri())]).await;

    assert!(matches!(result, Err(PipelineError::FeedMalformed { .. })));
}

#[tokio::test]
async fn one_bad_url_fails_the_whole_fetch() {
    init_tracing();
    let server = MockServer::start().await;
    serve(&server, "/rss.xml", 200, RSS_FEED).await;

    let source = RssFeedSource::new(fast_config()).unwrap();
    let urls = vec![format!("{}/rss.xml", server.uri()), "not a url".to_string()];

    let result = source.fetch(&urls).await;

    assert!(matches!(result, Err(PipelineError::FeedUnavailable { .. })));
}
