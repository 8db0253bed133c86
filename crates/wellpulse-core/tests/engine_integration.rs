//! Integration tests for the engagement engine: scoring baseline, file-backed
//! persistence, migrations and the background ticker.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use tokio::sync::{mpsc, Mutex};
use wellpulse_core::storage::{migrations, ScoringConfig};
use wellpulse_core::{
    spawn_ticker, Category, Config, EngagementEngine, EngagementState, Event, JsonFileStore,
    MemoryStore, MoodLevel, Outcome, PersistOutcome, ScoreCalculator, StateStore,
};

fn config() -> Config {
    Config {
        rng_seed: Some(3),
        ..Config::default()
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 2, 9, 0, 0).unwrap()
}

#[test]
fn test_empty_state_has_defined_baseline() {
    let calc = ScoreCalculator::new(ScoringConfig::default(), FixedOffset::east_opt(0).unwrap());
    let state = EngagementState::new();
    let breakdown = calc.breakdown(&state, t0());

    assert!(breakdown.factors.iter().all(|f| f.value.is_finite()));
    assert_eq!(breakdown.raw, 51);
    assert_eq!(breakdown.previous, None);
    assert_eq!(calc.compute(&state, t0()), 51);
}

#[test]
fn test_state_survives_file_store_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("state.json"));

    let mut engine = EngagementEngine::new(config());
    for i in 0..12 {
        let outcome = if i % 4 == 0 { Outcome::Skip } else { Outcome::Valuable };
        engine.record_rating(Category::Science, true, outcome, t0() + Duration::minutes(i));
    }
    engine.log_mood(MoodLevel::Good, t0() + Duration::minutes(15));
    assert_eq!(engine.persist(&mut store), PersistOutcome::Saved);

    let (restored, warnings) = EngagementEngine::load(config(), &store);
    assert!(warnings.is_empty());
    assert_eq!(restored.state(), engine.state());
    assert_eq!(restored.state().progression.total_ratings, 12);
}

#[test]
fn test_v1_file_loads_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let v1 = serde_json::json!({
        "schema_version": 1,
        "state": {
            "ratings": [],
            "screen_time": { "lifetime_secs": 0, "today_secs": 0, "day": null },
            "moods": [],
            "streak_days": 2,
            "last_active_day": "2026-10-01",
            "quality_streak": 6,
            "wellness_score": 0,
            "score_history": [],
            "last_scored_at": null,
            "daily_scores": [],
            "progression": {
                "xp": 0,
                "total_ratings": 0,
                "total_valuable": 0,
                "unlocked": [],
                "completion_markers": [],
                "challenges_completed": 0
            },
            "daily_challenge": null
        }
    });
    std::fs::write(&path, v1.to_string()).unwrap();

    let store = JsonFileStore::new(&path);
    let (mut engine, warnings) = EngagementEngine::load(config(), &store);
    assert!(warnings.is_empty());
    assert_eq!(engine.state().quality_streak.best, 6);

    // next active day continues the streak
    engine.record_rating(Category::Health, true, Outcome::Valuable, t0());
    assert_eq!(engine.state().streak_days, 3);
    assert_eq!(engine.state().quality_streak.current, 7);
}

#[test]
fn test_unsupported_version_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let future = serde_json::json!({
        "schema_version": migrations::CURRENT_SCHEMA_VERSION + 1,
        "state": {}
    });
    std::fs::write(&path, future.to_string()).unwrap();

    let (engine, warnings) = EngagementEngine::load(config(), &JsonFileStore::new(&path));
    assert_eq!(engine.state(), &EngagementState::new());
    assert_eq!(warnings.len(), 1);
    assert!(matches!(
        &warnings[0],
        Event::PersistenceWarning { message } if message.contains("Unsupported")
    ));
}

#[test]
fn test_newer_document_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let future = serde_json::json!({
        "schema_version": migrations::CURRENT_SCHEMA_VERSION + 1,
        "state": { "from_the_future": true }
    })
    .to_string();
    std::fs::write(&path, &future).unwrap();

    let mut store = JsonFileStore::new(&path);
    let (mut engine, _) = EngagementEngine::load(config(), &store);
    engine.record_rating(Category::Health, true, Outcome::Valuable, t0());

    let outcome = engine.persist(&mut store);
    assert!(matches!(outcome, PersistOutcome::Failed { .. }));
    assert!(matches!(
        outcome.warning(),
        Some(Event::PersistenceWarning { message }) if message.contains("newer version")
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), future);
    assert_eq!(engine.state().progression.total_ratings, 1);
}

#[test]
fn test_scroll_detection_survives_restarts() {
    let mut store = MemoryStore::new();
    for i in 0..10 {
        let outcome = if i < 2 { Outcome::Valuable } else { Outcome::Skip };
        let (mut engine, warnings) = EngagementEngine::load(config(), &store);
        assert!(warnings.is_empty());
        engine.record_rating(
            Category::Entertainment,
            false,
            outcome,
            t0() + Duration::seconds(i * 5),
        );
        assert_eq!(engine.persist(&mut store), PersistOutcome::Saved);
    }

    let (engine, _) = EngagementEngine::load(config(), &store);
    assert!(engine.state().patterns.mindless_scroll_count >= 1);
    assert!(engine.state().patterns.nudges_sent >= 1);
    assert!(engine.state().session.last_nudge_at.is_some());
}

#[test]
fn test_quota_failure_compacts_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut engine = EngagementEngine::new(config());
    for i in 0..260 {
        let at = t0() + Duration::seconds(i * 20);
        engine.record_rating(Category::Arts, false, Outcome::Skip, at);
    }
    let full = migrations::encode(engine.state()).unwrap().len();
    let mut store = JsonFileStore::new(&path).with_quota(Some(full * 9 / 10));

    assert_eq!(engine.persist(&mut store), PersistOutcome::SavedAfterCompaction);
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.ratings.len(), 200);
    assert_eq!(saved.progression.total_ratings, 260);
}

#[test]
fn test_challenge_bonus_paid_once_across_ticks() {
    let mut engine = EngagementEngine::new(config());
    for i in 0..40 {
        let at = t0() + Duration::minutes(i);
        engine.record_rating(Category::Health, true, Outcome::Valuable, at);
    }
    let state = engine.state();
    let challenge = state.daily_challenge.clone().unwrap();
    assert!(challenge.completed);
    assert_eq!(state.progression.challenges_completed, 1);
    let xp = state.progression.xp;

    for m in 0..5 {
        let events = engine.tick(t0() + Duration::minutes(41 + m));
        assert!(!events.iter().any(|e| matches!(e, Event::ChallengeCompleted { .. })));
    }
    assert_eq!(engine.state().progression.xp, xp);
}

#[tokio::test]
async fn test_ticker_forwards_events_until_cancelled() {
    let engine = Arc::new(Mutex::new(EngagementEngine::new(config())));
    let (tx, mut rx) = mpsc::channel(16);
    let handle = spawn_ticker(Arc::clone(&engine), StdDuration::from_millis(10), tx);

    let first = tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first, Event::ScoreUpdated { previous: None, .. }));

    handle.cancel();
    let drained = tokio::time::timeout(StdDuration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok());
    assert!(engine.lock().await.state().last_scored_at.is_some());
}
