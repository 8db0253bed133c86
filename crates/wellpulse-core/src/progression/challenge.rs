//! Daily challenge templates and progress rules.
//!
//! ## Lifecycle
//!
//! ```text
//! NoChallenge -> Active(day) -> Completed(day) -> Expired -> Active(next day)
//! ```
//!
//! Progress is never accumulated incrementally. It is recomputed from the
//! day's ratings on every read, so repeated reads are idempotent.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::state::{DailyChallenge, RatingEvent};

/// Gap that ends a sitting.
pub const SITTING_GAP_MINUTES: i64 = 30;
/// Ratings needed before alignment percentage counts.
pub const ALIGNMENT_MIN_RATINGS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Rate N items today.
    RateItems,
    /// Find N valuable items today.
    FindValuable,
    /// Keep today's aligned percentage at or above the target.
    SustainAlignment,
    /// N valuable items within one sitting.
    ValuableInSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    NoChallenge,
    Active,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct ChallengeTemplate {
    pub id: &'static str,
    pub kind: ChallengeKind,
    pub target: u32,
    pub xp_reward: u32,
    pub description: &'static str,
}

impl ChallengeTemplate {
    pub fn instantiate(&self, day: NaiveDate) -> DailyChallenge {
        DailyChallenge {
            id: self.id.to_string(),
            kind: self.kind,
            target: self.target,
            progress: 0,
            day,
            completed: false,
        }
    }
}

pub static TEMPLATES: [ChallengeTemplate; 4] = [
    ChallengeTemplate {
        id: "rate_10",
        kind: ChallengeKind::RateItems,
        target: 10,
        xp_reward: 50,
        description: "Rate 10 items today",
    },
    ChallengeTemplate {
        id: "find_valuable_5",
        kind: ChallengeKind::FindValuable,
        target: 5,
        xp_reward: 60,
        description: "Find 5 valuable items today",
    },
    ChallengeTemplate {
        id: "alignment_80",
        kind: ChallengeKind::SustainAlignment,
        target: 80,
        xp_reward: 75,
        description: "Keep 80% of today's ratings on your goals",
    },
    ChallengeTemplate {
        id: "session_valuable_3",
        kind: ChallengeKind::ValuableInSession,
        target: 3,
        xp_reward: 70,
        description: "Find 3 valuable items in one sitting",
    },
];

pub fn template(id: &str) -> Option<&'static ChallengeTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

/// Marker recorded once a challenge's bonus has been paid for `day`.
pub fn completion_marker(challenge_id: &str, day: NaiveDate) -> String {
    format!("challenge:{}:{}", challenge_id, day.format("%Y-%m-%d"))
}

/// Progress for `kind` over one day's ratings (oldest first).
pub fn progress(kind: ChallengeKind, today: &[&RatingEvent]) -> u32 {
    match kind {
        ChallengeKind::RateItems => today.len() as u32,
        ChallengeKind::FindValuable => today.iter().filter(|r| r.is_valuable()).count() as u32,
        ChallengeKind::SustainAlignment => {
            if today.len() < ALIGNMENT_MIN_RATINGS {
                return 0;
            }
            let aligned = today.iter().filter(|r| r.aligned).count();
            (aligned * 100 / today.len()) as u32
        }
        ChallengeKind::ValuableInSession => best_sitting_valuable(today),
    }
}

fn best_sitting_valuable(today: &[&RatingEvent]) -> u32 {
    let gap = Duration::minutes(SITTING_GAP_MINUTES);
    let mut best = 0;
    let mut current = 0;
    let mut last_at = None;

    for rating in today {
        if let Some(prev) = last_at {
            if rating.timestamp - prev > gap {
                current = 0;
            }
        }
        if rating.is_valuable() {
            current += 1;
            best = best.max(current);
        }
        last_at = Some(rating.timestamp);
    }
    best
}

/// Lifecycle status of `challenge` as seen on `today`.
pub fn status(challenge: Option<&DailyChallenge>, today: NaiveDate) -> ChallengeStatus {
    match challenge {
        None => ChallengeStatus::NoChallenge,
        Some(c) if c.day != today => ChallengeStatus::Expired,
        Some(c) if c.completed => ChallengeStatus::Completed,
        Some(_) => ChallengeStatus::Active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Category, Outcome};
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, h, m, 0).unwrap()
    }

    fn ev(outcome: Outcome, aligned: bool, ts: DateTime<Utc>) -> RatingEvent {
        RatingEvent::new(
            Category::Education,
            aligned,
            outcome,
            ts,
            FixedOffset::east_opt(0).unwrap(),
        )
    }

    #[test]
    fn counts_and_valuable() {
        let events = vec![
            ev(Outcome::Valuable, true, at(9, 0)),
            ev(Outcome::Skip, false, at(9, 1)),
            ev(Outcome::Valuable, false, at(9, 2)),
        ];
        let refs: Vec<_> = events.iter().collect();
        assert_eq!(progress(ChallengeKind::RateItems, &refs), 3);
        assert_eq!(progress(ChallengeKind::FindValuable, &refs), 2);
    }

    #[test]
    fn alignment_requires_minimum_sample() {
        let events: Vec<_> = (0..4).map(|i| ev(Outcome::Skip, true, at(9, i))).collect();
        let refs: Vec<_> = events.iter().collect();
        assert_eq!(progress(ChallengeKind::SustainAlignment, &refs), 0);

        let mut events = events;
        events.push(ev(Outcome::Skip, false, at(9, 5)));
        let refs: Vec<_> = events.iter().collect();
        assert_eq!(progress(ChallengeKind::SustainAlignment, &refs), 80);
    }

    #[test]
    fn sittings_split_on_long_gaps() {
        let events = vec![
            ev(Outcome::Valuable, true, at(8, 0)),
            ev(Outcome::Valuable, true, at(8, 10)),
            // 50 minute gap starts a new sitting
            ev(Outcome::Valuable, true, at(9, 0)),
            ev(Outcome::Skip, true, at(9, 5)),
            ev(Outcome::Valuable, true, at(9, 20)),
            ev(Outcome::Valuable, true, at(9, 45)),
        ];
        let refs: Vec<_> = events.iter().collect();
        assert_eq!(progress(ChallengeKind::ValuableInSession, &refs), 3);
    }

    #[test]
    fn status_transitions() {
        let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let mut challenge = TEMPLATES[0].instantiate(day);
        assert_eq!(status(None, day), ChallengeStatus::NoChallenge);
        assert_eq!(status(Some(&challenge), day), ChallengeStatus::Active);
        challenge.completed = true;
        assert_eq!(status(Some(&challenge), day), ChallengeStatus::Completed);
        assert_eq!(
            status(Some(&challenge), day.succ_opt().unwrap()),
            ChallengeStatus::Expired
        );
    }

    #[test]
    fn marker_is_unique_per_day() {
        let d1 = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        assert_eq!(completion_marker("rate_10", d1), "challenge:rate_10:2026-06-01");
        assert_ne!(
            completion_marker("rate_10", d1),
            completion_marker("rate_10", d1.succ_opt().unwrap())
        );
    }
}
