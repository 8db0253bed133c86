//! Wellness score calculator.
//!
//! The score is the sum of seven independently clamped factors, clamped to
//! `[floor, 100]` and then smoothed against the previous score:
//!
//! ```text
//! final = round(previous * 0.3 + raw * 0.7)
//! ```
//!
//! | Factor              | Max | Empty fallback |
//! |---------------------|-----|----------------|
//! | Goal alignment      | 30  | 12             |
//! | Time management     | 20  | 15 (no usage)  |
//! | Mood trajectory     | 18  | 10             |
//! | Engagement quality  | 15  | 7              |
//! | Consistency bonus   | 10  | 0              |
//! | Content diversity   | 12  | 5 (<10 ratings)|
//! | Recency weighting   | 5   | 2              |

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::events::Event;
use crate::state::{local_day, trim_front, EngagementState, MoodSample, RatingEvent};
use crate::storage::ScoringConfig;

/// Ratings considered by the ratio-based factors.
pub const RECENT_WINDOW: usize = 20;
const MOOD_WINDOW: usize = 10;
const MOOD_RECENT: usize = 3;
const DIVERSITY_MIN_RATINGS: usize = 10;
const DIVERSITY_CATEGORY_CAP: usize = 5;

const ALIGNMENT_BASELINE: f64 = 12.0;
const MOOD_BASELINE: f64 = 10.0;
const QUALITY_BASELINE: f64 = 7.0;
const DIVERSITY_BASELINE: f64 = 5.0;
const RECENCY_BASELINE: f64 = 2.0;

/// One factor's contribution to the raw score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    pub value: f64,
    pub max: f64,
}

impl ScoreFactor {
    fn new(name: &str, value: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            value: value.clamp(0.0, max),
            max,
        }
    }
}

/// Complete scoring breakdown for explainability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub factors: Vec<ScoreFactor>,
    /// Sum of factors after rounding and clamping.
    pub raw: u8,
    /// Previous score used for smoothing, if any.
    pub previous: Option<u8>,
    /// Smoothed score.
    pub score: u8,
}

impl ScoreBreakdown {
    pub fn factor(&self, name: &str) -> Option<&ScoreFactor> {
        self.factors.iter().find(|f| f.name == name)
    }
}

/// Derives the wellness score from engagement state.
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    config: ScoringConfig,
    offset: FixedOffset,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig, offset: FixedOffset) -> Self {
        Self { config, offset }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score for `state` at `now`. Pure: does not modify the state.
    pub fn compute(&self, state: &EngagementState, now: DateTime<Utc>) -> u8 {
        self.breakdown(state, now).score
    }

    /// Per-factor breakdown plus raw and smoothed totals.
    pub fn breakdown(&self, state: &EngagementState, now: DateTime<Utc>) -> ScoreBreakdown {
        let recent: Vec<&RatingEvent> = state.recent_ratings(RECENT_WINDOW).collect();
        let today = local_day(now, self.offset);
        let history = state.historical_daily_scores(today);

        let factors = vec![
            ScoreFactor::new("goal_alignment", goal_alignment(&recent), 30.0),
            ScoreFactor::new(
                "time_management",
                time_management(screen_hours_for(state, today)),
                20.0,
            ),
            ScoreFactor::new(
                "mood_trajectory",
                mood_trajectory(state.moods.iter().copied().collect::<Vec<_>>().as_slice()),
                18.0,
            ),
            ScoreFactor::new("engagement_quality", engagement_quality(&recent), 15.0),
            ScoreFactor::new(
                "consistency",
                consistency(state.streak_days, &history),
                10.0,
            ),
            ScoreFactor::new(
                "content_diversity",
                content_diversity(&recent, state.ratings.len()),
                12.0,
            ),
            ScoreFactor::new("recency", recency(state, now), 5.0),
        ];

        let floor = self.config.floor.min(100);
        let sum: f64 = factors.iter().map(|f| f.value).sum();
        let raw = (sum.round().max(0.0) as u32).clamp(floor as u32, 100) as u8;

        let previous = state
            .last_scored_at
            .map(|_| state.wellness_score.clamp(floor, 100));
        let score = match previous {
            Some(prev) => {
                let w = self.config.previous_weight.clamp(0.0, 1.0);
                let blended = prev as f64 * w + raw as f64 * (1.0 - w);
                (blended.round() as u32).clamp(floor as u32, 100) as u8
            }
            None => raw,
        };

        ScoreBreakdown {
            factors,
            raw,
            previous,
            score,
        }
    }

    /// Write `score` into the state and history.
    ///
    /// Returns a `ScoreUpdated` event on the first computation or when the
    /// value changed.
    pub fn apply(
        &self,
        state: &mut EngagementState,
        score: u8,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        let previous = state.last_scored_at.map(|_| state.wellness_score);
        state.wellness_score = score.min(100);
        state.last_scored_at = Some(now);
        state.scored_revision = state.revision;

        let differs = state
            .score_history
            .back()
            .map_or(true, |&last| (last as i16 - score as i16).abs() > 1);
        if differs {
            state.score_history.push_back(score);
            trim_front(&mut state.score_history, self.config.history_cap.max(1));
        }
        state.upsert_daily_score(local_day(now, self.offset), score);

        if previous != Some(score) {
            tracing::debug!(score, ?previous, "wellness score updated");
            Some(Event::ScoreUpdated {
                value: score,
                previous,
            })
        } else {
            None
        }
    }

    /// Compute and apply in one step.
    pub fn refresh(&self, state: &mut EngagementState, now: DateTime<Utc>) -> Option<Event> {
        let score = self.compute(state, now);
        self.apply(state, score, now)
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    count as f64 / total.max(1) as f64
}

fn screen_hours_for(state: &EngagementState, today: chrono::NaiveDate) -> f64 {
    // A stale counter belongs to a previous day.
    if state.screen_time.day == Some(today) {
        state.screen_time.today_hours()
    } else {
        0.0
    }
}

/// Aligned-ratio x 25, +5 above 0.8.
pub(crate) fn goal_alignment(recent: &[&RatingEvent]) -> f64 {
    if recent.is_empty() {
        return ALIGNMENT_BASELINE;
    }
    let r = ratio(recent.iter().filter(|e| e.aligned).count(), recent.len());
    let bonus = if r > 0.8 { 5.0 } else { 0.0 };
    (r * 25.0 + bonus).min(30.0)
}

/// Step function over today's screen hours; ideal band is 1-2h.
pub(crate) fn time_management(hours: f64) -> f64 {
    let hours = hours.max(0.0);
    if hours == 0.0 {
        15.0
    } else if hours < 1.0 {
        17.0
    } else if hours <= 2.0 {
        20.0
    } else if hours <= 4.0 {
        16.0
    } else if hours <= 6.0 {
        12.0
    } else {
        (12.0 - 2.0 * (hours - 6.0)).max(0.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len().max(1) as f64
}

/// Trend of the last three samples against the rest of a 10-sample window.
pub(crate) fn mood_trajectory(moods: &[MoodSample]) -> f64 {
    if moods.is_empty() {
        return MOOD_BASELINE;
    }
    let window = &moods[moods.len().saturating_sub(MOOD_WINDOW)..];
    let split = window.len().saturating_sub(MOOD_RECENT);
    let (earlier, recent) = window.split_at(split);

    let recent_vals: Vec<f64> = recent.iter().map(|m| m.level.value()).collect();
    let recent_mean = mean(&recent_vals);

    let base = if !earlier.is_empty() {
        let earlier_vals: Vec<f64> = earlier.iter().map(|m| m.level.value()).collect();
        let earlier_mean = mean(&earlier_vals);
        if recent_mean > earlier_mean + 5.0 {
            Some(15.0)
        } else {
            None
        }
    } else {
        None
    };
    let base: f64 = base.unwrap_or(if recent_mean >= 75.0 {
        13.0
    } else if recent_mean >= 50.0 {
        10.0
    } else {
        7.0
    });

    let all_positive = recent.iter().all(|m| m.level.is_positive());
    let positive_bonus = if recent.len() == MOOD_RECENT && all_positive {
        3.0
    } else {
        0.0
    };
    (base + positive_bonus).min(18.0)
}

/// Valuable-ratio x 15, damped when the user mostly skips.
pub(crate) fn engagement_quality(recent: &[&RatingEvent]) -> f64 {
    if recent.is_empty() {
        return QUALITY_BASELINE;
    }
    let valuable = ratio(recent.iter().filter(|e| e.is_valuable()).count(), recent.len());
    let skip = ratio(recent.iter().filter(|e| e.is_skip()).count(), recent.len());
    let mut score = valuable * 15.0;
    if skip > 0.7 {
        score *= 0.7;
    }
    score.min(15.0)
}

/// Streak tiers plus a bonus for strong trailing days.
pub(crate) fn consistency(streak_days: u32, historical: &[u8]) -> f64 {
    let streak: f64 = if streak_days >= 7 {
        5.0
    } else if streak_days >= 3 {
        3.0
    } else if streak_days >= 1 {
        1.0
    } else {
        0.0
    };
    let bonus = if historical.len() >= 5 {
        let tail = &historical[historical.len() - 5..];
        let avg = tail.iter().map(|&s| s as f64).sum::<f64>() / 5.0;
        if avg >= 75.0 {
            5.0
        } else {
            0.0
        }
    } else {
        0.0
    };
    (streak + bonus).min(10.0)
}

/// Distinct categories among recent ratings, once enough ratings exist.
pub(crate) fn content_diversity(recent: &[&RatingEvent], total_ratings: usize) -> f64 {
    if total_ratings < DIVERSITY_MIN_RATINGS {
        return DIVERSITY_BASELINE;
    }
    let distinct: HashSet<_> = recent.iter().map(|e| e.category).collect();
    let capped = distinct.len().min(DIVERSITY_CATEGORY_CAP);
    let bonus = if distinct.len() >= 3 { 2.0 } else { 0.0 };
    (ratio(capped, DIVERSITY_CATEGORY_CAP) * 10.0 + bonus).min(12.0)
}

/// Share of aligned+valuable ratings in the last hour.
pub(crate) fn recency(state: &EngagementState, now: DateTime<Utc>) -> f64 {
    let cutoff = now - Duration::hours(1);
    let last_hour: Vec<&RatingEvent> = state
        .ratings
        .iter()
        .rev()
        .take_while(|e| e.timestamp > cutoff)
        .filter(|e| e.timestamp <= now)
        .collect();
    if last_hour.is_empty() {
        return RECENCY_BASELINE;
    }
    let quality = last_hour.iter().filter(|e| e.is_quality()).count();
    (ratio(quality, last_hour.len()) * 5.0).min(5.0)
}
