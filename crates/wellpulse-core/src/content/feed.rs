//! Multi-category fetch with partial-failure semantics.

use std::sync::Arc;

use serde::Serialize;

use super::cache::RateLimitedCache;
use super::source::{ContentItem, ContentSource, RawContentItem};
use crate::error::FetchError;
use crate::state::Category;

/// Cache key for a category listing.
pub fn cache_key(category: Category) -> String {
    format!("category:{}", category.key())
}

/// A category that could not be fetched this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedFailure {
    pub category: Category,
    pub message: String,
    #[serde(skip)]
    pub error: FetchError,
}

/// Result of one feed cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedBatch {
    pub items: Vec<ContentItem>,
    pub failures: Vec<FeedFailure>,
    /// Items that failed validation.
    pub dropped: usize,
}

impl FeedBatch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pulls items for several categories through a shared cache.
pub struct ContentFeed<S> {
    source: S,
    cache: Arc<RateLimitedCache<Vec<RawContentItem>>>,
    goals: Vec<Category>,
}

impl<S: ContentSource> ContentFeed<S> {
    pub fn new(
        source: S,
        cache: Arc<RateLimitedCache<Vec<RawContentItem>>>,
        goals: Vec<Category>,
    ) -> Self {
        Self {
            source,
            cache,
            goals,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &Arc<RateLimitedCache<Vec<RawContentItem>>> {
        &self.cache
    }

    /// Fetch each category in turn.
    ///
    /// A failing category is recorded and skipped; invalid items are counted
    /// and dropped. Neither stops the rest of the batch.
    pub async fn fetch_categories(&self, categories: &[Category]) -> FeedBatch {
        let mut batch = FeedBatch::default();

        for &category in categories {
            let key = cache_key(category);
            let raw = match self.cache.acquire(&key, || self.source.fetch(category)).await {
                Ok(raw) => raw,
                Err(error) => {
                    tracing::warn!(%category, %error, "skipping category");
                    batch.failures.push(FeedFailure {
                        category,
                        message: error.to_string(),
                        error,
                    });
                    continue;
                }
            };

            for item in raw {
                match ContentItem::validate(item, &self.goals) {
                    Ok(item) => batch.items.push(item),
                    Err(error) => {
                        tracing::warn!(%category, %error, "dropping invalid item");
                        batch.dropped += 1;
                    }
                }
            }
        }

        tracing::debug!(
            items = batch.items.len(),
            failures = batch.failures.len(),
            dropped = batch.dropped,
            "feed cycle finished"
        );
        batch
    }
}
