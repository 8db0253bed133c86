//! The engagement orchestrator.
//!
//! `EngagementEngine` owns the [`EngagementState`] for one user session and
//! is the only thing that mutates it. Every operation returns the events it
//! produced, in order:
//!
//! ```text
//! rating ─> record ─> XP ─> active day ─> score ─> challenge ─> achievements ─> nudge
//! ```
//!
//! Nothing here is fatal. Load and save failures degrade to in-memory
//! operation with a `PersistenceWarning`.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};

use crate::error::PersistenceError;
use crate::events::Event;
use crate::patterns::PatternDetector;
use crate::progression::{ChallengeStatus, ProgressionEngine};
use crate::scoring::{ScoreBreakdown, ScoreCalculator};
use crate::state::{
    local_day, Category, DailyChallenge, EngagementState, MoodLevel, MoodSample, Outcome,
    RatingEvent,
};
use crate::storage::{Config, StateStore};
use crate::tick::{TickKind, TickScheduler};

/// What happened to a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Saved,
    /// The first write failed; it succeeded after trimming history.
    SavedAfterCompaction,
    /// Nothing was written; the engine keeps running in memory.
    Failed { message: String },
}

impl PersistOutcome {
    pub fn is_saved(&self) -> bool {
        !matches!(self, PersistOutcome::Failed { .. })
    }

    /// The user-visible warning for a failed save.
    pub fn warning(&self) -> Option<Event> {
        match self {
            PersistOutcome::Failed { message } => Some(Event::PersistenceWarning {
                message: message.clone(),
            }),
            _ => None,
        }
    }
}

pub struct EngagementEngine {
    config: Config,
    offset: FixedOffset,
    state: EngagementState,
    scorer: ScoreCalculator,
    progression: ProgressionEngine,
    patterns: PatternDetector,
    scheduler: TickScheduler,
    /// Set when the stored document must not be overwritten.
    save_blocked: Option<String>,
}

impl EngagementEngine {
    pub fn new(config: Config) -> Self {
        Self::with_state(config, EngagementState::new())
    }

    pub fn with_state(config: Config, state: EngagementState) -> Self {
        let offset = config.offset();
        Self {
            scorer: ScoreCalculator::new(config.scoring.clone(), offset),
            progression: ProgressionEngine::new(offset, config.rng_seed),
            patterns: PatternDetector::new(config.patterns.clone()),
            scheduler: TickScheduler::new(&config.ticks),
            save_blocked: None,
            offset,
            state,
            config,
        }
    }

    /// Resume from `store`, or start fresh.
    ///
    /// A document that cannot be read or migrated is not fatal: the engine
    /// starts from empty state and the returned events carry a warning. A
    /// document from a newer schema is left untouched: [`Self::persist`]
    /// refuses to write over it.
    pub fn load<S: StateStore + ?Sized>(config: Config, store: &S) -> (Self, Vec<Event>) {
        match store.load() {
            Ok(Some(state)) => {
                tracing::debug!(revision = state.revision, "state loaded");
                (Self::with_state(config, state), Vec::new())
            }
            Ok(None) => (Self::new(config), Vec::new()),
            Err(err) => {
                tracing::warn!(error = %err, "could not load saved state, starting fresh");
                let warning = Event::PersistenceWarning {
                    message: format!(
                        "Saved progress could not be loaded ({err}). Starting fresh."
                    ),
                };
                let mut engine = Self::new(config);
                if matches!(err, PersistenceError::UnsupportedVersion { .. }) {
                    engine.save_blocked = Some(format!(
                        "Saved progress was written by a newer version ({err}). \
                         Changes are kept for this session only."
                    ));
                }
                (engine, vec![warning])
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &EngagementState {
        &self.state
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_day(now, self.offset)
    }

    pub fn breakdown(&self, now: DateTime<Utc>) -> ScoreBreakdown {
        self.scorer.breakdown(&self.state, now)
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut TickScheduler {
        &mut self.scheduler
    }

    // ── Ratings ──────────────────────────────────────────────────────

    /// Record a rating made at `now`.
    pub fn record_rating(
        &mut self,
        category: Category,
        aligned: bool,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Vec<Event> {
        let rating = RatingEvent::new(category, aligned, outcome, now, self.offset);
        self.apply_rating(rating)
    }

    /// Run the full rating pipeline for an already-built event.
    pub fn apply_rating(&mut self, rating: RatingEvent) -> Vec<Event> {
        let now = rating.timestamp;
        let today = self.today(now);
        let mut events = Vec::new();

        self.state.push_rating(rating.clone());
        events.push(self.progression.award_rating_xp(&mut self.state, &rating));
        self.state.record_active_day(today);

        events.extend(self.scorer.refresh(&mut self.state, now));

        events.extend(self.progression.update_challenge(&mut self.state, today));
        events.extend(self.progression.check_achievements(&mut self.state));

        let before = self.state.patterns;
        let nudge = self.patterns.on_rating(
            &mut self.state.session,
            &rating,
            self.state.quality_streak.current,
            &mut self.state.patterns,
        );
        if self.state.patterns != before {
            self.state.touch();
        }
        events.extend(nudge.map(Event::from));

        // Progression and nudge bookkeeping are not score inputs.
        self.mark_scored();
        log_events(&events);
        events
    }

    // ── Moods and screen time ────────────────────────────────────────

    pub fn log_mood(&mut self, level: MoodLevel, now: DateTime<Utc>) -> Vec<Event> {
        self.state.push_mood(MoodSample { level, at: now }, now);
        let mut events: Vec<Event> =
            self.scorer.refresh(&mut self.state, now).into_iter().collect();
        events.extend(self.progression.check_achievements(&mut self.state));
        self.mark_scored();
        log_events(&events);
        events
    }

    pub fn add_screen_time(&mut self, secs: u64, now: DateTime<Utc>) -> Vec<Event> {
        let today = self.today(now);
        self.state.add_screen_time(secs, today);
        let mut events: Vec<Event> =
            self.scorer.refresh(&mut self.state, now).into_iter().collect();
        events.extend(self.progression.check_achievements(&mut self.state));
        self.mark_scored();
        log_events(&events);
        events
    }

    fn mark_scored(&mut self) {
        if self.state.last_scored_at.is_some() {
            self.state.scored_revision = self.state.revision;
        }
    }

    // ── Challenge ────────────────────────────────────────────────────

    pub fn challenge_status(&self, now: DateTime<Utc>) -> ChallengeStatus {
        self.progression.status(&self.state, self.today(now))
    }

    /// Today's challenge, drawn or recomputed as needed.
    pub fn daily_challenge(&mut self, now: DateTime<Utc>) -> (Option<&DailyChallenge>, Vec<Event>) {
        let events = self.run_tick(TickKind::ChallengeCheck, now);
        (self.state.daily_challenge.as_ref(), events)
    }

    // ── Ticks ────────────────────────────────────────────────────────

    /// Run every tick kind once, regardless of schedule.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        TickKind::ALL
            .into_iter()
            .flat_map(|kind| self.run_tick(kind, now))
            .collect()
    }

    /// Run the kinds the scheduler reports as due.
    pub fn run_due_ticks(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let due = self.scheduler.due(now);
        due.into_iter()
            .flat_map(|kind| self.run_tick(kind, now))
            .collect()
    }

    /// Run one tick kind. Each kind is idempotent for unchanged inputs.
    pub fn run_tick(&mut self, kind: TickKind, now: DateTime<Utc>) -> Vec<Event> {
        let events = match kind {
            TickKind::ScoreRefresh => self.refresh_score(now),
            TickKind::ChallengeCheck => {
                let today = self.today(now);
                let mut events = self.progression.update_challenge(&mut self.state, today);
                events.extend(self.progression.check_achievements(&mut self.state));
                events
            }
            TickKind::SessionCheck => {
                let before = self.state.patterns;
                let nudge = self.patterns.check_session(
                    &mut self.state.session,
                    now,
                    &mut self.state.patterns,
                );
                if self.state.patterns != before {
                    self.state.touch();
                }
                nudge.map(Event::from).into_iter().collect()
            }
        };
        if !events.is_empty() {
            tracing::debug!(?kind, count = events.len(), "tick produced events");
        }
        events
    }

    fn refresh_score(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let moods_before = self.state.moods.len();
        self.state.prune_moods(now);
        if self.state.moods.len() != moods_before {
            self.state.touch();
        }
        if !self.score_is_stale(now) {
            return Vec::new();
        }
        let mut events: Vec<Event> =
            self.scorer.refresh(&mut self.state, now).into_iter().collect();
        events.extend(self.progression.check_achievements(&mut self.state));
        self.mark_scored();
        events
    }

    /// Whether anything the score depends on moved since it was computed.
    fn score_is_stale(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.state.last_scored_at else {
            return true;
        };
        self.state.revision != self.state.scored_revision
            || self.today(last) != self.today(now)
            || self.ratings_in_hour_before(last) != self.ratings_in_hour_before(now)
    }

    fn ratings_in_hour_before(&self, at: DateTime<Utc>) -> usize {
        let cutoff = at - Duration::hours(1);
        self.state
            .ratings
            .iter()
            .filter(|r| r.timestamp > cutoff && r.timestamp <= at)
            .count()
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Save the state, compacting once if the first write fails.
    ///
    /// When both writes fail the in-memory state is left exactly as it was.
    /// Nothing is written over a document from a newer schema.
    pub fn persist<S: StateStore + ?Sized>(&mut self, store: &mut S) -> PersistOutcome {
        if let Some(message) = &self.save_blocked {
            tracing::warn!("stored state is from a newer schema, not saving");
            return PersistOutcome::Failed {
                message: message.clone(),
            };
        }
        let first = match store.save(&self.state) {
            Ok(()) => return PersistOutcome::Saved,
            Err(err) => err,
        };
        tracing::warn!(error = %first, "save failed, compacting state and retrying");

        let snapshot = self.state.clone();
        self.state.compact();
        match store.save(&self.state) {
            Ok(()) => {
                tracing::info!(ratings = self.state.ratings.len(), "state saved after compaction");
                PersistOutcome::SavedAfterCompaction
            }
            Err(second) => {
                self.state = snapshot;
                tracing::warn!(error = %second, "state not saved, continuing in memory");
                PersistOutcome::Failed {
                    message: format!(
                        "Progress could not be saved ({second}). \
                         It is kept for this session only."
                    ),
                }
            }
        }
    }
}

fn log_events(events: &[Event]) {
    for event in events {
        tracing::debug!(event = event.kind(), "emitted");
    }
}
