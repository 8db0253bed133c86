//! # WellPulse Core Library
//!
//! This library provides the engagement engine behind the WellPulse wellness
//! tracker. It turns a stream of content ratings into a bounded wellness
//! score, achievements and daily challenges, and coaching nudges, and it
//! fetches content to rate through a throttled cache. The CLI binary is a
//! thin host over the same library.
//!
//! ## Architecture
//!
//! - **Engagement Engine**: single owner of the user's state. Callers feed it
//!   ratings, moods and screen time, and periodically invoke `tick()`
//! - **Scoring**: seven clamped factors, floored and smoothed
//! - **Progression**: static achievement catalog, seeded daily challenges, XP
//! - **Patterns**: session window analysis for coaching nudges
//! - **Content**: rate-limited TTL cache in front of an HTTP content source
//! - **Storage**: TOML configuration and versioned JSON state documents
//!
//! ## Key Components
//!
//! - [`EngagementEngine`]: Orchestrator and state owner
//! - [`ScoreCalculator`]: Wellness score computation
//! - [`ProgressionEngine`]: Achievements and daily challenges
//! - [`RateLimitedCache`]: Throttled content cache
//! - [`Config`]: Application configuration management

pub mod content;
pub mod engine;
pub mod error;
pub mod events;
pub mod patterns;
pub mod progression;
pub mod scoring;
pub mod state;
pub mod storage;
pub mod tick;

pub use content::{ContentFeed, ContentItem, ContentSource, HttpContentSource, RateLimitedCache};
pub use engine::{EngagementEngine, PersistOutcome};
pub use error::{ConfigError, CoreError, FetchError, PersistenceError, ValidationError};
pub use events::Event;
pub use patterns::{Nudge, NudgeKind, PatternDetector};
pub use progression::{AchievementId, ChallengeStatus, ProgressionEngine};
pub use scoring::{ScoreBreakdown, ScoreCalculator};
pub use state::{Category, EngagementState, MoodLevel, Outcome, RatingEvent};
pub use storage::{Config, JsonFileStore, MemoryStore, StateStore};
pub use tick::{spawn_ticker, TickKind, TickScheduler, TickerHandle};
