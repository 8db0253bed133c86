//! Read-mostly views: score, achievements, challenge, stats.

use chrono::Utc;
use serde_json::json;
use wellpulse_core::progression::{catalog, template};

use super::session::CmdResult;
use super::{print_json, Session};

/// Entries of score history shown by `score`.
const HISTORY_TAIL: usize = 10;

pub fn score() -> CmdResult {
    let session = Session::open()?;
    let engine = &session.engine;
    let state = engine.state();
    let history: Vec<u8> = state
        .score_history
        .iter()
        .rev()
        .take(HISTORY_TAIL)
        .rev()
        .copied()
        .collect();

    print_json(&json!({
        "score": state.wellness_score,
        "scored_at": state.last_scored_at,
        "breakdown": engine.breakdown(Utc::now()),
        "history": history,
    }))
}

pub fn achievements() -> CmdResult {
    let session = Session::open()?;
    let progression = &session.engine.state().progression;
    let entries: Vec<_> = catalog()
        .iter()
        .map(|def| {
            json!({
                "id": def.id,
                "name": def.name,
                "description": def.description,
                "xp_reward": def.xp_reward,
                "unlocked": progression.unlocked.contains(&def.id),
            })
        })
        .collect();

    print_json(&json!({
        "xp": progression.xp,
        "level": progression.level(),
        "unlocked": progression.unlocked.len(),
        "achievements": entries,
    }))
}

/// Today's challenge, drawing a new one if the stored one is stale.
pub fn challenge() -> CmdResult {
    let mut session = Session::open()?;
    let now = Utc::now();
    let (challenge, events) = session.engine.daily_challenge(now);
    let challenge = challenge.cloned();
    session.record(events);
    let status = session.engine.challenge_status(now);
    let description = challenge
        .as_ref()
        .and_then(|c| template(&c.id))
        .map(|t| t.description);
    let events = session.finish();

    print_json(&json!({
        "status": status,
        "challenge": challenge,
        "description": description,
        "events": events,
    }))
}

pub fn stats() -> CmdResult {
    let session = Session::open()?;
    let state = session.engine.state();
    let hourly: Vec<_> = state
        .hourly_buckets
        .iter()
        .enumerate()
        .filter(|(_, b)| b.ratings > 0)
        .map(|(hour, b)| {
            json!({
                "hour": hour,
                "ratings": b.ratings,
                "valuable": b.valuable,
                "aligned": b.aligned,
                "skip": b.skip,
            })
        })
        .collect();

    print_json(&json!({
        "total_ratings": state.progression.total_ratings,
        "total_valuable": state.progression.total_valuable,
        "streak_days": state.streak_days,
        "quality_streak": state.quality_streak,
        "screen_time": state.screen_time,
        "hourly": hourly,
        "patterns": state.patterns,
    }))
}
