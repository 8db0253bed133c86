use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::patterns::{Nudge, NudgeKind};
use crate::progression::AchievementId;

/// Every observable side effect of the engine produces an Event.
/// The presentation layer renders them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ScoreUpdated {
        value: u8,
        /// None on the first computation.
        previous: Option<u8>,
    },
    XpGained {
        amount: u32,
        reason: String,
        total: u64,
    },
    AchievementUnlocked {
        id: AchievementId,
        name: String,
        xp_reward: u32,
    },
    /// A fresh challenge was drawn for a new day.
    ChallengeAssigned {
        id: String,
        target: u32,
        day: NaiveDate,
    },
    ChallengeCompleted {
        id: String,
        xp_reward: u32,
    },
    CoachingNudge {
        kind: NudgeKind,
        message: String,
    },
    /// State could not be saved; the engine keeps running in memory.
    PersistenceWarning {
        message: String,
    },
}

impl Event {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ScoreUpdated { .. } => "score_updated",
            Event::XpGained { .. } => "xp_gained",
            Event::AchievementUnlocked { .. } => "achievement_unlocked",
            Event::ChallengeAssigned { .. } => "challenge_assigned",
            Event::ChallengeCompleted { .. } => "challenge_completed",
            Event::CoachingNudge { .. } => "coaching_nudge",
            Event::PersistenceWarning { .. } => "persistence_warning",
        }
    }
}

impl From<Nudge> for Event {
    fn from(nudge: Nudge) -> Self {
        Event::CoachingNudge {
            kind: nudge.kind,
            message: nudge.message,
        }
    }
}
