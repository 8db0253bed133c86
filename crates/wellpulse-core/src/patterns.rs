//! Session pattern detection and coaching nudges.
//!
//! The detector keeps a short rolling window of the current session's
//! ratings plus a 60-second burst buffer. Each new rating may produce
//! several candidate nudges; at most one is emitted, chosen by priority:
//!
//! 1. Rapid skipping (burst skip-ratio > 0.7 over >= 10 events)
//! 2. Course correction (valuable-ratio < 0.3 over >= 8 events)
//! 3. Micro break (session > 30 min with valuable-ratio < 0.5)
//! 4. Streak celebration (quality streak hits exactly 5)
//! 5. Positive reinforcement (valuable and aligned ratios >= 0.8)
//!
//! Emission is gated by a cooldown, and a message identical to the last
//! emitted one is never repeated back to back.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{PatternStats, RatingEvent};
use crate::storage::PatternsConfig;

const BURST_SECONDS: i64 = 60;
const BURST_MIN_EVENTS: usize = 10;
const BURST_SKIP_RATIO: f64 = 0.7;
const COURSE_CORRECTION_MIN_EVENTS: usize = 8;
const POSITIVE_MIN_EVENTS: usize = 5;
const STREAK_CELEBRATION_AT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeKind {
    PositiveReinforcement,
    CourseCorrection,
    MicroBreak,
    StreakCelebration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nudge {
    pub kind: NudgeKind,
    pub message: String,
}

/// What fired, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    RapidSkip,
    CourseCorrection,
    MicroBreak,
    StreakCelebration,
    PositiveReinforcement,
}

impl Trigger {
    fn kind(self) -> NudgeKind {
        match self {
            Trigger::RapidSkip | Trigger::CourseCorrection => NudgeKind::CourseCorrection,
            Trigger::MicroBreak => NudgeKind::MicroBreak,
            Trigger::StreakCelebration => NudgeKind::StreakCelebration,
            Trigger::PositiveReinforcement => NudgeKind::PositiveReinforcement,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn messages(self) -> &'static [&'static str] {
        match self {
            Trigger::RapidSkip => &[
                "You've skipped almost everything in the last minute. Try slowing down and picking one item to read properly.",
                "Lots of fast skipping just now. Is this still what you want to be doing?",
            ],
            Trigger::CourseCorrection => &[
                "Most of what you've seen lately hasn't been worth your time. Consider switching to one of your goal categories.",
                "Your feed isn't paying off right now. A change of topic might help.",
            ],
            Trigger::MicroBreak => &[
                "You've been at this for over 30 minutes. A short break could help you reset.",
                "Time for a stretch? A long session with little payoff is a good moment to pause.",
            ],
            Trigger::StreakCelebration => &[
                "Five great finds in a row. Keep it going!",
                "That's a streak of 5 valuable, on-goal items. Nice work!",
            ],
            Trigger::PositiveReinforcement => &[
                "Great choices lately. Your feed is working for you.",
                "You're finding valuable, on-goal content. Keep it up.",
            ],
        }
    }
}

/// Rolling session data, persisted with the rest of the state so a
/// session survives host restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSession {
    pub window: VecDeque<RatingEvent>,
    /// Ratings from the last 60 seconds.
    pub burst: VecDeque<RatingEvent>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub last_message: Option<String>,
    /// Next message slot per trigger.
    pub rotation: [usize; 5],
}

impl PatternSession {
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Valuable and aligned ratios over the current window.
    pub fn window_ratios(&self) -> (f64, f64) {
        let n = self.window.len().max(1) as f64;
        let valuable = self.window.iter().filter(|e| e.is_valuable()).count() as f64;
        let aligned = self.window.iter().filter(|e| e.aligned).count() as f64;
        (valuable / n, aligned / n)
    }
}

/// Detects consumption patterns within a session.
///
/// The detector holds only configuration; everything it learns lives in a
/// [`PatternSession`] owned by the caller.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    config: PatternsConfig,
}

impl PatternDetector {
    pub fn new(config: PatternsConfig) -> Self {
        Self { config }
    }

    fn window_size(&self) -> usize {
        self.config.window_size.clamp(10, 15)
    }

    fn session_expired(&self, session: &PatternSession, now: DateTime<Utc>) -> bool {
        session.last_event_at.map_or(true, |last| {
            now - last > Duration::seconds(self.config.session_timeout_secs as i64)
        })
    }

    fn session_too_long(&self, session: &PatternSession, now: DateTime<Utc>) -> bool {
        session.started_at.map_or(false, |start| {
            now - start > Duration::seconds(self.config.micro_break_after_secs as i64)
        })
    }

    /// Feed one rating. Counters in `stats` are updated even when the
    /// resulting nudge is suppressed by the cooldown.
    pub fn on_rating(
        &self,
        session: &mut PatternSession,
        event: &RatingEvent,
        quality_streak_current: u32,
        stats: &mut PatternStats,
    ) -> Option<Nudge> {
        let now = event.timestamp;
        if self.session_expired(session, now) {
            session.window.clear();
            session.burst.clear();
            session.started_at = Some(now);
        }
        session.last_event_at = Some(now);

        session.window.push_back(event.clone());
        while session.window.len() > self.window_size() {
            session.window.pop_front();
        }
        session.burst.push_back(event.clone());
        let burst_cutoff = now - Duration::seconds(BURST_SECONDS);
        while session.burst.front().is_some_and(|e| e.timestamp <= burst_cutoff) {
            session.burst.pop_front();
        }

        let mut triggers = Vec::new();

        if session.burst.len() >= BURST_MIN_EVENTS {
            let skips = session.burst.iter().filter(|e| e.is_skip()).count();
            if skips as f64 / session.burst.len() as f64 > BURST_SKIP_RATIO {
                stats.mindless_scroll_count += 1;
                tracing::debug!(events = session.burst.len(), skips, "rapid skipping detected");
                triggers.push(Trigger::RapidSkip);
            }
        }

        let (valuable, aligned) = session.window_ratios();
        if valuable < 0.3 && session.window.len() >= COURSE_CORRECTION_MIN_EVENTS {
            stats.mindless_scroll_count += 1;
            stats.course_corrections += 1;
            triggers.push(Trigger::CourseCorrection);
        }
        if self.session_too_long(session, now) && valuable < 0.5 {
            triggers.push(Trigger::MicroBreak);
        }
        if quality_streak_current == STREAK_CELEBRATION_AT {
            triggers.push(Trigger::StreakCelebration);
        }
        if valuable >= 0.8 && aligned >= 0.8 && session.window.len() >= POSITIVE_MIN_EVENTS {
            triggers.push(Trigger::PositiveReinforcement);
        }

        self.emit(session, &triggers, now, stats)
    }

    /// Tick-driven check for long, low-value sessions without a new rating.
    pub fn check_session(
        &self,
        session: &mut PatternSession,
        now: DateTime<Utc>,
        stats: &mut PatternStats,
    ) -> Option<Nudge> {
        if session.window.is_empty() || self.session_expired(session, now) {
            return None;
        }
        let (valuable, _) = session.window_ratios();
        if self.session_too_long(session, now) && valuable < 0.5 {
            return self.emit(session, &[Trigger::MicroBreak], now, stats);
        }
        None
    }

    fn in_cooldown(&self, session: &PatternSession, now: DateTime<Utc>) -> bool {
        session.last_nudge_at.map_or(false, |last| {
            now - last < Duration::seconds(self.config.cooldown_secs as i64)
        })
    }

    fn emit(
        &self,
        session: &mut PatternSession,
        triggers: &[Trigger],
        now: DateTime<Utc>,
        stats: &mut PatternStats,
    ) -> Option<Nudge> {
        if triggers.is_empty() || self.in_cooldown(session, now) {
            return None;
        }
        for &trigger in triggers {
            let messages = trigger.messages();
            let slot = session.rotation[trigger.index()] % messages.len();
            let message = messages[slot];
            if session.last_message.as_deref() == Some(message) {
                continue;
            }
            session.rotation[trigger.index()] = slot + 1;
            session.last_nudge_at = Some(now);
            session.last_message = Some(message.to_string());
            stats.nudges_sent += 1;
            return Some(Nudge {
                kind: trigger.kind(),
                message: message.to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Category, Outcome};
    use chrono::{FixedOffset, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 20, 0, 0).unwrap()
    }

    fn ev(outcome: Outcome, aligned: bool, at: DateTime<Utc>) -> RatingEvent {
        RatingEvent::new(
            Category::Entertainment,
            aligned,
            outcome,
            at,
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn detector() -> PatternDetector {
        PatternDetector::new(PatternsConfig::default())
    }

    #[test]
    fn rapid_skipping_counts_and_nudges() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let mut nudges = Vec::new();
        for i in 0..10 {
            let outcome = if i < 2 { Outcome::Valuable } else { Outcome::Skip };
            let at = start() + Duration::seconds(i * 5);
            nudges.extend(d.on_rating(&mut s, &ev(outcome, false, at), 0, &mut stats));
        }
        assert!(stats.mindless_scroll_count >= 1);
        assert!(nudges.iter().any(|n| n.kind == NudgeKind::CourseCorrection));
        // cooldown allows only one nudge in this 45 second burst
        assert_eq!(nudges.len(), 1);
    }

    #[test]
    fn session_resumes_from_serialized_form() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let mut nudges = Vec::new();
        for i in 0..10 {
            let outcome = if i < 2 { Outcome::Valuable } else { Outcome::Skip };
            let at = start() + Duration::seconds(i * 5);
            let text = serde_json::to_string(&s).unwrap();
            s = serde_json::from_str(&text).unwrap();
            nudges.extend(d.on_rating(&mut s, &ev(outcome, false, at), 0, &mut stats));
        }
        assert!(stats.mindless_scroll_count >= 1);
        assert_eq!(nudges.len(), 1);
        assert_eq!(s.window_len(), 10);
        assert_eq!(s.started_at, Some(start()));
    }

    #[test]
    fn rapid_skip_detected_independently_of_window() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        // valuable warm-up outside the 60s burst window keeps the
        // window's valuable ratio above the course-correction threshold
        for i in 0..6 {
            let at = start() + Duration::seconds(i);
            d.on_rating(&mut s, &ev(Outcome::Valuable, true, at), 0, &mut stats);
        }
        let base = start() + Duration::seconds(120);
        let mut last = None;
        for i in 0..10 {
            let outcome = if i < 2 { Outcome::Valuable } else { Outcome::Skip };
            let at = base + Duration::seconds(i);
            last = d.on_rating(&mut s, &ev(outcome, true, at), 0, &mut stats);
        }
        assert!(stats.mindless_scroll_count >= 1);
        let nudge = last.expect("rapid skip nudge");
        assert_eq!(nudge.kind, NudgeKind::CourseCorrection);
        assert!(nudge.message.contains("skip"));
    }

    #[test]
    fn streak_celebration_at_exactly_five() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let mut kinds = Vec::new();
        for i in 1..=6u32 {
            let at = start() + Duration::minutes(i as i64 * 3);
            let nudge = d.on_rating(&mut s, &ev(Outcome::Valuable, true, at), i, &mut stats);
            if let Some(n) = nudge {
                kinds.push((i, n.kind));
            }
        }
        assert!(kinds.contains(&(5, NudgeKind::StreakCelebration)));
    }

    #[test]
    fn positive_reinforcement_needs_a_sample() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let first = d.on_rating(&mut s, &ev(Outcome::Valuable, true, start()), 0, &mut stats);
        assert!(first.is_none());
        let mut got = None;
        for i in 1..5 {
            got = d.on_rating(
                &mut s,
                &ev(Outcome::Valuable, true, start() + Duration::seconds(i)),
                0,
                &mut stats,
            );
        }
        assert_eq!(got.map(|n| n.kind), Some(NudgeKind::PositiveReinforcement));
    }

    #[test]
    fn cooldown_blocks_back_to_back_nudges() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let mut emitted = 0;
        for i in 0..30 {
            let at = start() + Duration::seconds(i * 10);
            if d.on_rating(&mut s, &ev(Outcome::Valuable, true, at), 0, &mut stats).is_some() {
                emitted += 1;
            }
        }
        // 290 seconds of positive ratings with a 120s cooldown
        assert_eq!(emitted, 3);
        assert_eq!(stats.nudges_sent, 3);
    }

    #[test]
    fn identical_consecutive_messages_are_suppressed() {
        let config = PatternsConfig {
            cooldown_secs: 0,
            ..PatternsConfig::default()
        };
        let d = PatternDetector::new(config);
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        let mut messages = Vec::new();
        for i in 0..8 {
            let at = start() + Duration::seconds(i);
            let nudge = d.on_rating(&mut s, &ev(Outcome::Valuable, true, at), 0, &mut stats);
            if let Some(n) = nudge {
                messages.push(n.message);
            }
        }
        assert!(messages.len() >= 2);
        for pair in messages.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
    }

    #[test]
    fn micro_break_on_long_low_value_session() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        for i in 0..6 {
            let outcome = if i % 3 == 0 { Outcome::Valuable } else { Outcome::Skip };
            let at = start() + Duration::minutes(i * 5);
            assert!(d.on_rating(&mut s, &ev(outcome, false, at), 0, &mut stats).is_none());
        }
        // session started at 20:00, last rating 20:25
        let nudge = d.check_session(&mut s, start() + Duration::minutes(36), &mut stats);
        assert_eq!(nudge.map(|n| n.kind), Some(NudgeKind::MicroBreak));
    }

    #[test]
    fn idle_gap_starts_a_new_session() {
        let d = detector();
        let mut s = PatternSession::default();
        let mut stats = PatternStats::default();
        for i in 0..5 {
            let at = start() + Duration::minutes(i);
            d.on_rating(&mut s, &ev(Outcome::Skip, false, at), 0, &mut stats);
        }
        let later = start() + Duration::hours(2);
        d.on_rating(&mut s, &ev(Outcome::Skip, false, later), 0, &mut stats);
        assert_eq!(s.window_len(), 1);
        assert_eq!(s.started_at, Some(later));
    }
}
