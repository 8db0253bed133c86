//! Engagement state aggregate and its value types.
//!
//! `EngagementState` is owned by exactly one [`crate::EngagementEngine`]. All
//! collections are capped so the persisted document stays bounded:
//!
//! | Collection      | Cap | Compacted cap |
//! |-----------------|-----|---------------|
//! | ratings         | 500 | 200           |
//! | score_history   | 100 | 50            |
//! | moods (7 days)  | 50  | 20            |
//! | daily_scores    | 30  | 14            |
//! | session window  | 15  | 15            |

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::patterns::PatternSession;
use crate::progression::{AchievementId, ChallengeKind};

pub const MAX_RATINGS: usize = 500;
pub const MAX_MOODS: usize = 50;
pub const MOOD_WINDOW_DAYS: i64 = 7;
pub const MAX_SCORE_HISTORY: usize = 100;
pub const MAX_DAILY_SCORES: usize = 30;

pub const COMPACT_RATINGS: usize = 200;
pub const COMPACT_SCORE_HISTORY: usize = 50;
pub const COMPACT_MOODS: usize = 20;
pub const COMPACT_DAILY_SCORES: usize = 14;

/// Content category a rated item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Technology,
    Science,
    Health,
    Finance,
    Education,
    Arts,
    News,
    Entertainment,
    Sports,
    Lifestyle,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Technology,
        Category::Science,
        Category::Health,
        Category::Finance,
        Category::Education,
        Category::Arts,
        Category::News,
        Category::Entertainment,
        Category::Sports,
        Category::Lifestyle,
    ];

    /// Stable key used in cache keys, config and wire formats.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::Science => "science",
            Category::Health => "health",
            Category::Finance => "finance",
            Category::Education => "education",
            Category::Arts => "arts",
            Category::News => "news",
            Category::Entertainment => "entertainment",
            Category::Sports => "sports",
            Category::Lifestyle => "lifestyle",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.key() == needle)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// What the user decided about a rated item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Valuable,
    Skip,
}

impl FromStr for Outcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "valuable" => Ok(Outcome::Valuable),
            "skip" => Ok(Outcome::Skip),
            other => Err(ValidationError::InvalidValue {
                field: "outcome".into(),
                message: format!("expected 'valuable' or 'skip', got '{other}'"),
            }),
        }
    }
}

/// A single immutable rating in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub id: String,
    pub category: Category,
    pub aligned: bool,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// Hour of day (0-23) in the user's offset.
    pub hour_of_day: u8,
}

impl RatingEvent {
    pub fn new(
        category: Category,
        aligned: bool,
        outcome: Outcome,
        timestamp: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            category,
            aligned,
            outcome,
            timestamp,
            hour_of_day: timestamp.with_timezone(&offset).hour() as u8,
        }
    }

    pub fn is_valuable(&self) -> bool {
        self.outcome == Outcome::Valuable
    }

    pub fn is_skip(&self) -> bool {
        self.outcome == Outcome::Skip
    }

    /// Valuable and aligned: the only outcome that grows the quality streak.
    pub fn is_quality(&self) -> bool {
        self.aligned && self.is_valuable()
    }

    pub fn day(&self, offset: FixedOffset) -> NaiveDate {
        local_day(self.timestamp, offset)
    }
}

/// Calendar day of `at` in the given offset.
pub fn local_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Self-reported mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLevel {
    Great,
    Good,
    Okay,
    Low,
    Bad,
}

impl MoodLevel {
    /// Numeric value on a 0-100 scale.
    pub fn value(&self) -> f64 {
        match self {
            MoodLevel::Great => 90.0,
            MoodLevel::Good => 75.0,
            MoodLevel::Okay => 55.0,
            MoodLevel::Low => 35.0,
            MoodLevel::Bad => 15.0,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, MoodLevel::Great | MoodLevel::Good)
    }
}

impl FromStr for MoodLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "great" => Ok(MoodLevel::Great),
            "good" => Ok(MoodLevel::Good),
            "okay" | "ok" => Ok(MoodLevel::Okay),
            "low" => Ok(MoodLevel::Low),
            "bad" => Ok(MoodLevel::Bad),
            other => Err(ValidationError::InvalidValue {
                field: "mood".into(),
                message: format!("unknown mood '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoodSample {
    pub level: MoodLevel,
    pub at: DateTime<Utc>,
}

/// Screen time counters. `today_secs` belongs to `day`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenTime {
    pub lifetime_secs: u64,
    pub today_secs: u64,
    pub day: Option<NaiveDate>,
}

impl ScreenTime {
    pub fn today_hours(&self) -> f64 {
        self.today_secs as f64 / 3600.0
    }
}

/// Consecutive valuable+aligned ratings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityStreak {
    pub current: u32,
    pub best: u32,
}

impl QualityStreak {
    pub fn record(&mut self, quality: bool) {
        if quality {
            self.current += 1;
            self.best = self.best.max(self.current);
        } else {
            self.current = 0;
        }
    }
}

/// Per-hour-of-day rating tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub ratings: u32,
    pub valuable: u32,
    pub aligned: u32,
    pub skip: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScore {
    pub day: NaiveDate,
    pub score: u8,
}

/// XP, unlocks and one-time completion markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressionState {
    pub xp: u64,
    /// Lifetime counters; survive ledger trimming.
    pub total_ratings: u64,
    pub total_valuable: u64,
    pub unlocked: BTreeSet<AchievementId>,
    pub completion_markers: BTreeSet<String>,
    pub challenges_completed: u32,
}

impl ProgressionState {
    /// `floor(sqrt(xp / 100)) + 1`
    pub fn level(&self) -> u32 {
        ((self.xp as f64 / 100.0).sqrt().floor() as u32) + 1
    }
}

/// Today's challenge. Progress is always recomputed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChallenge {
    pub id: String,
    pub kind: ChallengeKind,
    pub target: u32,
    pub progress: u32,
    pub day: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternStats {
    pub mindless_scroll_count: u32,
    pub course_corrections: u32,
    pub nudges_sent: u32,
}

/// The mutable engagement aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngagementState {
    pub ratings: VecDeque<RatingEvent>,
    pub screen_time: ScreenTime,
    pub moods: VecDeque<MoodSample>,
    pub streak_days: u32,
    pub last_active_day: Option<NaiveDate>,
    pub quality_streak: QualityStreak,
    pub wellness_score: u8,
    pub score_history: VecDeque<u8>,
    pub last_scored_at: Option<DateTime<Utc>>,
    /// `revision` at the last score computation.
    pub scored_revision: u64,
    pub daily_scores: VecDeque<DailyScore>,
    pub progression: ProgressionState,
    pub daily_challenge: Option<DailyChallenge>,
    pub hourly_buckets: [HourlyBucket; 24],
    pub patterns: PatternStats,
    /// Pattern detector session, carried across restarts.
    pub session: PatternSession,
    pub revision: u64,
}

impl Default for EngagementState {
    fn default() -> Self {
        Self {
            ratings: VecDeque::new(),
            screen_time: ScreenTime::default(),
            moods: VecDeque::new(),
            streak_days: 0,
            last_active_day: None,
            quality_streak: QualityStreak::default(),
            wellness_score: 0,
            score_history: VecDeque::new(),
            last_scored_at: None,
            scored_revision: 0,
            daily_scores: VecDeque::new(),
            progression: ProgressionState::default(),
            daily_challenge: None,
            hourly_buckets: [HourlyBucket::default(); 24],
            patterns: PatternStats::default(),
            session: PatternSession::default(),
            revision: 0,
        }
    }
}

impl EngagementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the state as changed.
    pub fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ── Ratings ──────────────────────────────────────────────────────

    /// Append a rating, update tallies and trim the ledger.
    pub fn push_rating(&mut self, event: RatingEvent) {
        let bucket = &mut self.hourly_buckets[(event.hour_of_day as usize) % 24];
        bucket.ratings += 1;
        if event.is_valuable() {
            bucket.valuable += 1;
        }
        if event.aligned {
            bucket.aligned += 1;
        }
        if event.is_skip() {
            bucket.skip += 1;
        }

        self.progression.total_ratings += 1;
        if event.is_valuable() {
            self.progression.total_valuable += 1;
        }
        self.quality_streak.record(event.is_quality());

        self.ratings.push_back(event);
        trim_front(&mut self.ratings, MAX_RATINGS);
        self.touch();
    }

    /// The `n` most recent ratings, oldest first.
    pub fn recent_ratings(&self, n: usize) -> impl Iterator<Item = &RatingEvent> + '_ {
        let start = self.ratings.len().saturating_sub(n);
        self.ratings.range(start..)
    }

    /// Ratings whose local day is `day`.
    pub fn ratings_on(&self, day: NaiveDate, offset: FixedOffset) -> Vec<&RatingEvent> {
        self.ratings
            .iter()
            .filter(|r| r.day(offset) == day)
            .collect()
    }

    /// Update the consecutive-day streak for activity on `day`.
    pub fn record_active_day(&mut self, day: NaiveDate) {
        match self.last_active_day {
            Some(last) if last == day => return,
            Some(last) if last.succ_opt() == Some(day) => self.streak_days += 1,
            _ => self.streak_days = 1,
        }
        self.last_active_day = Some(day);
        self.touch();
    }

    // ── Moods ────────────────────────────────────────────────────────

    pub fn push_mood(&mut self, sample: MoodSample, now: DateTime<Utc>) {
        self.moods.push_back(sample);
        self.prune_moods(now);
        trim_front(&mut self.moods, MAX_MOODS);
        self.touch();
    }

    /// Drop mood samples older than the mood window.
    pub fn prune_moods(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::days(MOOD_WINDOW_DAYS);
        self.moods.retain(|m| m.at >= cutoff);
    }

    // ── Screen time ──────────────────────────────────────────────────

    /// Reset the daily counter if `today` is a new day. Returns true on rollover.
    pub fn roll_screen_day(&mut self, today: NaiveDate) -> bool {
        if self.screen_time.day == Some(today) {
            return false;
        }
        self.screen_time.day = Some(today);
        self.screen_time.today_secs = 0;
        self.touch();
        true
    }

    pub fn add_screen_time(&mut self, secs: u64, today: NaiveDate) {
        self.roll_screen_day(today);
        self.screen_time.today_secs = self.screen_time.today_secs.saturating_add(secs);
        self.screen_time.lifetime_secs = self.screen_time.lifetime_secs.saturating_add(secs);
        self.touch();
    }

    // ── Scores ───────────────────────────────────────────────────────

    /// Record `score` as the latest score for `day`.
    pub fn upsert_daily_score(&mut self, day: NaiveDate, score: u8) {
        match self.daily_scores.back_mut() {
            Some(last) if last.day == day => last.score = score,
            _ => {
                self.daily_scores.push_back(DailyScore { day, score });
                trim_front(&mut self.daily_scores, MAX_DAILY_SCORES);
            }
        }
    }

    /// Scores of days strictly before `today`, oldest first.
    pub fn historical_daily_scores(&self, today: NaiveDate) -> Vec<u8> {
        self.daily_scores
            .iter()
            .filter(|d| d.day < today)
            .map(|d| d.score)
            .collect()
    }

    // ── Compaction ───────────────────────────────────────────────────

    /// Trim every collection to its compacted cap.
    pub fn compact(&mut self) {
        trim_front(&mut self.ratings, COMPACT_RATINGS);
        trim_front(&mut self.score_history, COMPACT_SCORE_HISTORY);
        trim_front(&mut self.moods, COMPACT_MOODS);
        trim_front(&mut self.daily_scores, COMPACT_DAILY_SCORES);
        self.touch();
    }
}

/// Drop from the front until `deque.len() <= cap`.
pub(crate) fn trim_front<T>(deque: &mut VecDeque<T>, cap: usize) {
    while deque.len() > cap {
        deque.pop_front();
    }
}
