//! Static achievement catalog.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::scoring::RECENT_WINDOW;
use crate::state::EngagementState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstRating,
    TenRatings,
    HundredRatings,
    TenValuable,
    FiftyValuable,
    HabitForming,
    WeekWarrior,
    OnARoll,
    Unstoppable,
    WellnessMaster,
    LaserFocused,
    Explorer,
    MoodTracker,
    ChallengeChampion,
}

/// A catalog entry. Predicates are plain functions over state.
#[derive(Debug, Clone, Copy)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub xp_reward: u32,
    predicate: fn(&EngagementState) -> bool,
}

impl AchievementDefinition {
    pub fn is_met(&self, state: &EngagementState) -> bool {
        (self.predicate)(state)
    }
}

fn laser_focused(state: &EngagementState) -> bool {
    let recent: Vec<_> = state.recent_ratings(RECENT_WINDOW).collect();
    if recent.len() < 10 {
        return false;
    }
    let aligned = recent.iter().filter(|r| r.aligned).count();
    aligned as f64 / recent.len() as f64 >= 0.9
}

fn explorer(state: &EngagementState) -> bool {
    state
        .ratings
        .iter()
        .map(|r| r.category)
        .collect::<HashSet<_>>()
        .len()
        >= 5
}

static CATALOG: [AchievementDefinition; 14] = [
    AchievementDefinition {
        id: AchievementId::FirstRating,
        name: "First Steps",
        description: "Rate your first item",
        xp_reward: 10,
        predicate: |s| s.progression.total_ratings >= 1,
    },
    AchievementDefinition {
        id: AchievementId::TenRatings,
        name: "Getting Started",
        description: "Rate 10 items",
        xp_reward: 25,
        predicate: |s| s.progression.total_ratings >= 10,
    },
    AchievementDefinition {
        id: AchievementId::HundredRatings,
        name: "Centurion",
        description: "Rate 100 items",
        xp_reward: 100,
        predicate: |s| s.progression.total_ratings >= 100,
    },
    AchievementDefinition {
        id: AchievementId::TenValuable,
        name: "Treasure Hunter",
        description: "Find 10 valuable items",
        xp_reward: 30,
        predicate: |s| s.progression.total_valuable >= 10,
    },
    AchievementDefinition {
        id: AchievementId::FiftyValuable,
        name: "Curator",
        description: "Find 50 valuable items",
        xp_reward: 75,
        predicate: |s| s.progression.total_valuable >= 50,
    },
    AchievementDefinition {
        id: AchievementId::HabitForming,
        name: "Habit Forming",
        description: "Stay active 3 days in a row",
        xp_reward: 40,
        predicate: |s| s.streak_days >= 3,
    },
    AchievementDefinition {
        id: AchievementId::WeekWarrior,
        name: "Week Warrior",
        description: "Stay active 7 days in a row",
        xp_reward: 100,
        predicate: |s| s.streak_days >= 7,
    },
    AchievementDefinition {
        id: AchievementId::OnARoll,
        name: "On a Roll",
        description: "5 valuable, on-goal ratings in a row",
        xp_reward: 50,
        predicate: |s| s.quality_streak.best >= 5,
    },
    AchievementDefinition {
        id: AchievementId::Unstoppable,
        name: "Unstoppable",
        description: "10 valuable, on-goal ratings in a row",
        xp_reward: 100,
        predicate: |s| s.quality_streak.best >= 10,
    },
    AchievementDefinition {
        id: AchievementId::WellnessMaster,
        name: "Wellness Master",
        description: "Reach a wellness score of 80",
        xp_reward: 75,
        predicate: |s| s.last_scored_at.is_some() && s.wellness_score >= 80,
    },
    AchievementDefinition {
        id: AchievementId::LaserFocused,
        name: "Laser Focused",
        description: "Keep 90% of your last 20 ratings on-goal",
        xp_reward: 60,
        predicate: laser_focused,
    },
    AchievementDefinition {
        id: AchievementId::Explorer,
        name: "Explorer",
        description: "Rate items from 5 different categories",
        xp_reward: 40,
        predicate: explorer,
    },
    AchievementDefinition {
        id: AchievementId::MoodTracker,
        name: "Mood Tracker",
        description: "Log your mood 7 times",
        xp_reward: 20,
        predicate: |s| s.moods.len() >= 7,
    },
    AchievementDefinition {
        id: AchievementId::ChallengeChampion,
        name: "Challenge Champion",
        description: "Complete 3 daily challenges",
        xp_reward: 80,
        predicate: |s| s.progression.challenges_completed >= 3,
    },
];

/// The full catalog, in evaluation order.
pub fn catalog() -> &'static [AchievementDefinition] {
    &CATALOG
}

pub fn definition(id: AchievementId) -> &'static AchievementDefinition {
    // Every id has exactly one entry; see `catalog_covers_every_id`.
    CATALOG
        .iter()
        .find(|d| d.id == id)
        .unwrap_or(&CATALOG[0])
}
