//! Achievements, daily challenges and XP.

mod achievements;
mod challenge;

pub use achievements::{catalog, definition, AchievementDefinition, AchievementId};
pub use challenge::{
    completion_marker, progress, status, template, ChallengeKind, ChallengeStatus,
    ChallengeTemplate, TEMPLATES,
};

use chrono::{Datelike, FixedOffset, NaiveDate};
use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;

use crate::events::Event;
use crate::state::{EngagementState, RatingEvent};

/// XP for a valuable rating that matches a goal.
pub const XP_QUALITY_RATING: u32 = 10;
/// XP for a valuable rating off-goal.
pub const XP_VALUABLE_RATING: u32 = 5;
/// XP for a skip.
pub const XP_SKIP_RATING: u32 = 1;

/// Evaluates unlocks and drives the daily challenge.
///
/// Challenge selection uses a PCG generator. With a fixed seed the draw for a
/// given day is the same in every process, and still varies from day to day.
#[derive(Debug, Clone)]
pub struct ProgressionEngine {
    offset: FixedOffset,
    seed: Option<u64>,
    rng: Mcg128Xsl64,
}

impl ProgressionEngine {
    /// Seeded from `seed` when given, otherwise from OS entropy.
    pub fn new(offset: FixedOffset, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => Mcg128Xsl64::seed_from_u64(seed),
            None => Mcg128Xsl64::from_entropy(),
        };
        Self { offset, seed, rng }
    }

    fn draw_template(&mut self, today: NaiveDate) -> usize {
        match self.seed {
            Some(seed) => {
                let day = today.num_days_from_ce() as u64;
                Mcg128Xsl64::seed_from_u64(seed ^ day).gen_range(0..TEMPLATES.len())
            }
            None => self.rng.gen_range(0..TEMPLATES.len()),
        }
    }

    // ── Achievements ─────────────────────────────────────────────────

    /// Unlock every catalog entry whose predicate now holds.
    ///
    /// Already-unlocked ids are skipped, so calling this twice without new
    /// events yields nothing the second time.
    pub fn check_achievements(&self, state: &mut EngagementState) -> Vec<Event> {
        let mut events = Vec::new();
        for def in catalog() {
            if state.progression.unlocked.contains(&def.id) || !def.is_met(state) {
                continue;
            }
            state.progression.unlocked.insert(def.id);
            state.progression.xp += def.xp_reward as u64;
            tracing::info!(achievement = ?def.id, xp = def.xp_reward, "achievement unlocked");
            events.push(Event::AchievementUnlocked {
                id: def.id,
                name: def.name.to_string(),
                xp_reward: def.xp_reward,
            });
        }
        if !events.is_empty() {
            state.touch();
        }
        events
    }

    // ── XP ───────────────────────────────────────────────────────────

    /// Base XP for a single rating.
    pub fn award_rating_xp(&self, state: &mut EngagementState, rating: &RatingEvent) -> Event {
        let (amount, reason) = if rating.is_quality() {
            (XP_QUALITY_RATING, "valuable on-goal rating")
        } else if rating.is_valuable() {
            (XP_VALUABLE_RATING, "valuable rating")
        } else {
            (XP_SKIP_RATING, "rating")
        };
        state.progression.xp += amount as u64;
        state.touch();
        Event::XpGained {
            amount,
            reason: reason.to_string(),
            total: state.progression.xp,
        }
    }

    // ── Daily challenge ──────────────────────────────────────────────

    pub fn status(&self, state: &EngagementState, today: NaiveDate) -> ChallengeStatus {
        status(state.daily_challenge.as_ref(), today)
    }

    /// Draw a new challenge if there is none for `today`.
    ///
    /// The day key changes at most once per calendar day; progress starts at 0.
    pub fn ensure_challenge(
        &mut self,
        state: &mut EngagementState,
        today: NaiveDate,
    ) -> Option<Event> {
        if matches!(
            self.status(state, today),
            ChallengeStatus::Active | ChallengeStatus::Completed
        ) {
            return None;
        }
        let idx = self.draw_template(today);
        let challenge = TEMPLATES[idx].instantiate(today);
        tracing::debug!(challenge = %challenge.id, %today, "daily challenge assigned");
        let event = Event::ChallengeAssigned {
            id: challenge.id.clone(),
            target: challenge.target,
            day: today,
        };
        state.daily_challenge = Some(challenge);
        state.touch();
        Some(event)
    }

    /// Ensure today's challenge, recompute its progress and pay out on completion.
    ///
    /// The bonus is paid once per `(challenge id, day)` via a completion marker.
    pub fn update_challenge(
        &mut self,
        state: &mut EngagementState,
        today: NaiveDate,
    ) -> Vec<Event> {
        let mut events: Vec<Event> = self.ensure_challenge(state, today).into_iter().collect();

        let Some(challenge) = state.daily_challenge.as_ref() else {
            return events;
        };
        let kind = challenge.kind;
        let todays = state.ratings_on(today, self.offset);
        let new_progress = progress(kind, &todays);

        let Some(challenge) = state.daily_challenge.as_mut() else {
            return events;
        };
        let changed = challenge.progress != new_progress;
        challenge.progress = new_progress;

        if challenge.progress >= challenge.target {
            let marker = completion_marker(&challenge.id, challenge.day);
            challenge.completed = true;
            if !state.progression.completion_markers.contains(&marker) {
                let xp_reward = template(&challenge.id).map_or(0, |t| t.xp_reward);
                let id = challenge.id.clone();
                state.progression.completion_markers.insert(marker);
                state.progression.xp += xp_reward as u64;
                state.progression.challenges_completed += 1;
                tracing::info!(challenge = %id, xp = xp_reward, "daily challenge completed");
                events.push(Event::ChallengeCompleted { id, xp_reward });
                state.touch();
                return events;
            }
        }
        if changed {
            state.touch();
        }
        events
    }
}
