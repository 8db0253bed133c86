//! External content sources and item validation.

use std::future::Future;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ConfigError, FetchError, ValidationError};
use crate::state::Category;
use crate::storage::ContentConfig;

/// Retry delay assumed when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// An item as the source sends it. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawContentItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body_snippet: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub popularity_score: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A validated item ready to be shown and rated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub author: String,
    pub body_snippet: String,
    pub source_id: String,
    pub popularity_score: f64,
    pub category: Category,
    /// Whether `category` is one of the user's goals.
    pub aligned: bool,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

impl ContentItem {
    /// Check a raw item and derive its goal alignment.
    ///
    /// # Errors
    /// Fails on a blank `id` or `title`, an unknown category, or a negative or
    /// non-finite popularity score.
    pub fn validate(raw: RawContentItem, goals: &[Category]) -> Result<Self, ValidationError> {
        let id = required(raw.id, "id")?;
        let title = required(raw.title, "title")?;
        let category: Category = required(raw.category, "category")?.parse()?;

        let popularity_score = raw.popularity_score.unwrap_or(0.0);
        if !popularity_score.is_finite() || popularity_score < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "popularity_score".into(),
                message: format!("{popularity_score} is not a non-negative number"),
            });
        }

        Ok(Self {
            id,
            title,
            author: raw.author.unwrap_or_default(),
            body_snippet: raw.body_snippet.unwrap_or_default(),
            source_id: raw.source_id.unwrap_or_default(),
            popularity_score,
            category,
            aligned: goals.contains(&category),
        })
    }
}

/// Something that can list items for a category.
///
/// The engine never calls a source directly; fetches go through
/// [`RateLimitedCache`](super::RateLimitedCache).
pub trait ContentSource: Send + Sync {
    fn fetch(
        &self,
        category: Category,
    ) -> impl Future<Output = Result<Vec<RawContentItem>, FetchError>> + Send;
}

/// JSON-over-HTTP source: `GET {base_url}/items?category={key}`.
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: Client,
    base_url: Url,
}

impl HttpContentSource {
    pub fn new(config: &ContentConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::InvalidValue {
            key: "content.base_url".into(),
            message: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                key: "content.base_url".into(),
                message: "must be a hierarchical URL".into(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "content.request_timeout_secs".into(),
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn items_url(&self, category: Category) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("items");
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("category", category.key());
        url
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl ContentSource for HttpContentSource {
    async fn fetch(&self, category: Category) -> Result<Vec<RawContentItem>, FetchError> {
        let url = self.items_url(category);
        tracing::debug!(%url, "fetching content");

        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited {
                retry_after: retry_after(resp.headers()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        Ok(resp.json::<Vec<RawContentItem>>().await?)
    }
}
