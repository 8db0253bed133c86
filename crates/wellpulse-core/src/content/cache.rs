//! TTL cache in front of a rate-limited producer.
//!
//! ```text
//! acquire(key) ─┬─ hit (not expired) ──────────────────────────> value
//!               └─ miss ─> throttle() ─> producer() ─┬─ Ok ─> store ─> value
//!                             ^                      ├─ RateLimited ─> sleep(retry_after) ─┐
//!                             └──────────────────────┼─────────────────────────────────────┘
//!                                                    └─ other Err ─> caller (not cached)
//! ```
//!
//! One `tokio::sync::Mutex` guards both the entry store and the call window.
//! It is never held across a sleep or while the producer runs.

use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::error::FetchError;
use crate::storage::CacheConfig;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    key: String,
    value: T,
    expires_at: Instant,
}

#[derive(Debug)]
struct Inner<T> {
    /// Insertion order; the front is evicted first.
    entries: VecDeque<CacheEntry<T>>,
    /// Admission timestamps, oldest first.
    window: VecDeque<Instant>,
}

/// Capacity-bounded FIFO cache with a sliding-window call limiter.
#[derive(Debug)]
pub struct RateLimitedCache<T> {
    config: CacheConfig,
    inner: Mutex<Inner<T>>,
}

impl<T: Clone> RateLimitedCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity.max(1);
        let max_requests = config.max_requests.max(1);
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity + 1),
                window: VecDeque::with_capacity(max_requests),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, or produce, cache and return it.
    ///
    /// Waits in the rate window when it is full. A `RateLimited` failure is
    /// retried after its (capped) delay up to `rate_limit_retries` times;
    /// every other failure is returned immediately and nothing is cached.
    /// Dropping the returned future cancels the call.
    pub async fn acquire<F, Fut>(&self, key: &str, mut producer: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        if let Some(value) = self.lookup(key).await {
            tracing::debug!(key, "cache hit");
            return Ok(value);
        }

        let mut retries_left = self.config.rate_limit_retries;
        loop {
            self.throttle().await;
            match producer().await {
                Ok(value) => {
                    self.store(key, value.clone()).await;
                    return Ok(value);
                }
                Err(FetchError::RateLimited { retry_after }) if retries_left > 0 => {
                    retries_left -= 1;
                    let delay = retry_after.min(self.config.max_retry_after());
                    tracing::warn!(
                        key,
                        delay_secs = delay.as_secs(),
                        "rate limited by source, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "fetch failed");
                    return Err(err);
                }
            }
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up with
    /// [`FetchError::Cancelled`] as soon as `cancel` completes.
    pub async fn acquire_until<F, Fut, C>(
        &self,
        key: &str,
        producer: F,
        cancel: C,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.acquire(key, producer) => result,
            () = cancel => {
                tracing::debug!(key, "fetch cancelled");
                Err(FetchError::Cancelled)
            }
        }
    }

    // ── Window ───────────────────────────────────────────────────────

    /// Wait for a slot in the call window, then record this call.
    async fn throttle(&self) {
        let window = self.config.window();
        let max_requests = self.config.max_requests.max(1);
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                prune_window(&mut inner.window, now, window);
                if inner.window.len() < max_requests {
                    inner.window.push_back(now);
                    return;
                }
                inner
                    .window
                    .front()
                    .map(|oldest| (*oldest + window).saturating_duration_since(now))
                    .unwrap_or(Duration::ZERO)
            };
            tracing::debug!(wait_ms = wait.as_millis() as u64, "rate window full");
            sleep(wait).await;
        }
    }

    /// Calls recorded within the current window.
    pub async fn window_len(&self) -> usize {
        let mut inner = self.inner.lock().await;
        prune_window(&mut inner.window, Instant::now(), self.config.window());
        inner.window.len()
    }

    // ── Entries ──────────────────────────────────────────────────────

    async fn lookup(&self, key: &str) -> Option<T> {
        let mut inner = self.inner.lock().await;
        let idx = inner.entries.iter().position(|e| e.key == key)?;
        if inner.entries[idx].expires_at <= Instant::now() {
            inner.entries.remove(idx);
            return None;
        }
        Some(inner.entries[idx].value.clone())
    }

    async fn store(&self, key: &str, value: T) {
        let capacity = self.config.capacity.max(1);
        let mut inner = self.inner.lock().await;
        inner.entries.retain(|e| e.key != key);
        inner.entries.push_back(CacheEntry {
            key: key.to_string(),
            value,
            expires_at: Instant::now() + self.config.ttl(),
        });
        while inner.entries.len() > capacity {
            if let Some(evicted) = inner.entries.pop_front() {
                tracing::debug!(key = %evicted.key, "cache eviction");
            }
        }
    }

    /// Number of stored entries, including any not yet found expired.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether an unexpired entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        inner
            .entries
            .iter()
            .any(|e| e.key == key && e.expires_at > now)
    }

    /// Keys in eviction order.
    pub async fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub async fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner.entries.retain(|e| e.key != key);
        inner.entries.len() != before
    }

    /// Drop every entry. The call window is kept.
    pub async fn clear(&self) {
        self.inner.lock().await.entries.clear();
    }
}

fn prune_window(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(oldest) = window.front() {
        if now.saturating_duration_since(*oldest) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}
