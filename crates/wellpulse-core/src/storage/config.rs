//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Goal categories and the local UTC offset
//! - Score smoothing policy
//! - Content cache and rate-limit tuning
//! - Coaching nudge thresholds
//! - Tick intervals
//!
//! Configuration is stored at `~/.config/wellpulse/config.toml`.

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::state::Category;

/// Score smoothing and history policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the previous score when blending with a fresh raw score.
    #[serde(default = "default_previous_weight")]
    pub previous_weight: f64,
    #[serde(default = "default_floor")]
    pub floor: u8,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

/// Content cache and sliding-window rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Upper bound on how long a source's retry-after hint is honoured.
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
}

/// Coaching nudge thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// Rolling window length, clamped to 10..=15 at use.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_session_secs")]
    pub session_timeout_secs: u64,
    #[serde(default = "default_session_secs")]
    pub micro_break_after_secs: u64,
}

/// External content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Periodic tick intervals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "default_score_refresh_secs")]
    pub score_refresh_secs: u64,
    #[serde(default = "default_challenge_check_secs")]
    pub challenge_check_secs: u64,
    #[serde(default = "default_session_check_secs")]
    pub session_check_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/wellpulse/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Categories the user wants to see more of.
    #[serde(default = "default_goals")]
    pub goals: Vec<Category>,
    /// Local offset used for day boundaries and hourly buckets.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Fixed seed for challenge selection. Entropy when unset.
    #[serde(default)]
    pub rng_seed: Option<u64>,
    /// Size limit for the persisted state document.
    #[serde(default)]
    pub state_quota_bytes: Option<usize>,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub ticks: TickConfig,
}

// Default functions
fn default_previous_weight() -> f64 {
    0.3
}
fn default_floor() -> u8 {
    20
}
fn default_history_cap() -> usize {
    crate::state::MAX_SCORE_HISTORY
}
fn default_ttl_secs() -> u64 {
    300
}
fn default_capacity() -> usize {
    10
}
fn default_max_requests() -> usize {
    30
}
fn default_window_secs() -> u64 {
    60
}
fn default_max_retry_after_secs() -> u64 {
    120
}
fn default_rate_limit_retries() -> u32 {
    1
}
fn default_window_size() -> usize {
    12
}
fn default_cooldown_secs() -> u64 {
    120
}
fn default_session_secs() -> u64 {
    30 * 60
}
fn default_base_url() -> String {
    "http://localhost:8080".into()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_score_refresh_secs() -> u64 {
    60
}
fn default_challenge_check_secs() -> u64 {
    300
}
fn default_session_check_secs() -> u64 {
    30
}
fn default_goals() -> Vec<Category> {
    vec![Category::Health, Category::Education, Category::Science]
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            previous_weight: default_previous_weight(),
            floor: default_floor(),
            history_cap: default_history_cap(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            capacity: 10,
            max_requests: 30,
            window_secs: 60,
            max_retry_after_secs: 120,
            rate_limit_retries: 1,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            window_size: 12,
            cooldown_secs: 120,
            session_timeout_secs: default_session_secs(),
            micro_break_after_secs: default_session_secs(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: 10,
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            score_refresh_secs: default_score_refresh_secs(),
            challenge_check_secs: default_challenge_check_secs(),
            session_check_secs: default_session_check_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            goals: default_goals(),
            utc_offset_minutes: 0,
            rng_seed: None,
            state_quota_bytes: None,
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            patterns: PatternsConfig::default(),
            content: ContentConfig::default(),
            ticks: TickConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }
        let mut parts = key.split('.').peekable();

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| {
                                    invalid(format!("cannot parse '{value}' as number"))
                                })?
                        } else if value == "null" {
                            serde_json::Value::Null
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Unset optionals take a JSON literal, or `null` to clear.
                    serde_json::Value::Null => serde_json::from_str(value)
                        .unwrap_or_else(|_| serde_json::Value::String(value.into())),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or create the default file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value in memory without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the
    /// field's type or range. `self` is left untouched on error.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Range checks that serde alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if !(0.0..=1.0).contains(&self.scoring.previous_weight) {
            return invalid("scoring.previous_weight", "must be between 0 and 1");
        }
        if self.scoring.floor > 100 {
            return invalid("scoring.floor", "must be at most 100");
        }
        if self.scoring.history_cap == 0 {
            return invalid("scoring.history_cap", "must be at least 1");
        }
        if self.cache.capacity == 0 {
            return invalid("cache.capacity", "must be at least 1");
        }
        if self.cache.max_requests == 0 || self.cache.window_secs == 0 {
            return invalid("cache.max_requests", "rate window must admit requests");
        }
        if !(10..=15).contains(&self.patterns.window_size) {
            return invalid("patterns.window_size", "must be between 10 and 15");
        }
        if self.utc_offset_minutes.abs() >= 24 * 60 {
            return invalid("utc_offset_minutes", "must be within one day");
        }
        if url::Url::parse(&self.content.base_url).is_err() {
            return invalid("content.base_url", "must be an absolute URL");
        }
        Ok(())
    }

    /// The configured offset as a chrono `FixedOffset`.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Whether `category` is one of the user's goals.
    pub fn is_goal(&self, category: Category) -> bool {
        self.goals.contains(&category)
    }
}
