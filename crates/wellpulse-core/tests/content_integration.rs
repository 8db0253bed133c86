//! Integration tests for the HTTP content source and the multi-category feed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use wellpulse_core::content::{cache_key, RawContentItem};
use wellpulse_core::storage::{CacheConfig, ContentConfig};
use wellpulse_core::{
    Category, ContentFeed, ContentSource, FetchError, HttpContentSource, RateLimitedCache,
};

fn source_for(base_url: String) -> HttpContentSource {
    HttpContentSource::new(&ContentConfig {
        base_url,
        request_timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn test_http_source_parses_items() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/items")
        .match_query(Matcher::UrlEncoded("category".into(), "health".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"id":"1","title":"Walk more","author":"Ana","category":"health","popularity_score":3.5},
                {"title":"missing id"}
            ]"#,
        )
        .create_async()
        .await;

    let items = source_for(server.url()).fetch(Category::Health).await.unwrap();

    mock.assert_async().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id.as_deref(), Some("1"));
    assert_eq!(items[0].popularity_score, Some(3.5));
    assert_eq!(items[1].id, None);
}

#[tokio::test]
async fn test_http_429_maps_to_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/items")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_header("retry-after", "7")
        .create_async()
        .await;

    let err = source_for(server.url()).fetch(Category::News).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::RateLimited {
            retry_after: Duration::from_secs(7)
        }
    );
}

#[tokio::test]
async fn test_http_429_without_header_defaults_to_a_minute() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/items")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let err = source_for(server.url()).fetch(Category::News).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::RateLimited {
            retry_after: Duration::from_secs(60)
        }
    );
}

#[tokio::test]
async fn test_http_errors_and_bad_bodies() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/items")
        .match_query(Matcher::UrlEncoded("category".into(), "finance".into()))
        .with_status(503)
        .create_async()
        .await;
    server
        .mock("GET", "/items")
        .match_query(Matcher::UrlEncoded("category".into(), "arts".into()))
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let source = source_for(server.url());
    assert_eq!(
        source.fetch(Category::Finance).await,
        Err(FetchError::Http { status: 503 })
    );
    assert!(matches!(
        source.fetch(Category::Arts).await,
        Err(FetchError::Decode(_))
    ));
}

#[tokio::test]
async fn test_unreachable_source_is_a_network_error() {
    let source = source_for("http://127.0.0.1:1".into());
    assert!(matches!(
        source.fetch(Category::Sports).await,
        Err(FetchError::Network(_))
    ));
}

// ── Feed ────────────────────────────────────────────────────────────

/// News is down; health returns one invalid item.
#[derive(Default)]
struct FlakySource {
    calls: AtomicUsize,
}

fn raw(id: &str, title: &str, category: &str) -> RawContentItem {
    RawContentItem {
        id: Some(id.into()),
        title: Some(title.into()),
        category: Some(category.into()),
        ..Default::default()
    }
}

impl ContentSource for FlakySource {
    async fn fetch(&self, category: Category) -> Result<Vec<RawContentItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match category {
            Category::News => Err(FetchError::Http { status: 503 }),
            Category::Health => Ok(vec![
                raw("h1", "Sleep hygiene", "health"),
                raw("h2", "   ", "health"),
            ]),
            other => Ok(vec![raw(&format!("{other}-1"), "Something", other.key())]),
        }
    }
}

#[tokio::test]
async fn test_feed_returns_partial_results() {
    let cache = Arc::new(RateLimitedCache::new(CacheConfig::default()));
    let feed = ContentFeed::new(FlakySource::default(), Arc::clone(&cache), vec![Category::Health]);

    let batch = feed
        .fetch_categories(&[Category::Health, Category::News, Category::Science])
        .await;

    assert_eq!(batch.items.len(), 2);
    assert!(batch.items.iter().any(|i| i.id == "h1" && i.aligned));
    assert!(batch.items.iter().any(|i| i.category == Category::Science && !i.aligned));
    assert_eq!(batch.dropped, 1);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].category, Category::News);
    assert_eq!(batch.failures[0].error, FetchError::Http { status: 503 });
    assert!(!batch.is_complete());

    assert!(cache.contains(&cache_key(Category::Health)).await);
    assert!(cache.contains(&cache_key(Category::Science)).await);
    assert!(!cache.contains(&cache_key(Category::News)).await);
}

#[tokio::test]
async fn test_feed_serves_repeats_from_cache() {
    let cache = Arc::new(RateLimitedCache::new(CacheConfig::default()));
    let feed = ContentFeed::new(FlakySource::default(), cache, vec![]);
    let categories = [Category::Health, Category::News];

    feed.fetch_categories(&categories).await;
    let second = feed.fetch_categories(&categories).await;

    // health cached, news retried because failures are never cached
    assert_eq!(feed_calls(&feed), 3);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.failures.len(), 1);
}

fn feed_calls(feed: &ContentFeed<FlakySource>) -> usize {
    feed.source().calls.load(Ordering::SeqCst)
}
