//! Content retrieval: a throttled TTL cache in front of external sources.

mod cache;
mod feed;
mod source;

pub use cache::RateLimitedCache;
pub use feed::{cache_key, ContentFeed, FeedBatch, FeedFailure};
pub use source::{
    ContentItem, ContentSource, HttpContentSource, RawContentItem, DEFAULT_RETRY_AFTER,
};
