//! State document schema migrations.
//!
//! Persisted state is wrapped in a versioned envelope:
//!
//! ```json
//! { "schema_version": 3, "state": { ... } }
//! ```
//!
//! Older documents are upgraded step by step before being decoded into
//! [`EngagementState`]. Unknown fields are rejected at decode time rather than
//! silently merged.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::PersistenceError;
use crate::patterns::PatternSession;
use crate::state::{EngagementState, HourlyBucket};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

#[derive(Debug, Serialize)]
struct DocumentRef<'a> {
    schema_version: u32,
    state: &'a EngagementState,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    schema_version: u32,
    state: Value,
}

/// Serialize `state` at the current schema version.
pub fn encode(state: &EngagementState) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(&DocumentRef {
        schema_version: CURRENT_SCHEMA_VERSION,
        state,
    })?)
}

/// Parse a stored document, migrating it to the current schema.
///
/// # Errors
/// Returns `UnsupportedVersion` for documents written by a newer schema and
/// `Corrupt` when the envelope or state cannot be recognised.
pub fn decode(text: &str) -> Result<EngagementState, PersistenceError> {
    let raw: RawDocument =
        serde_json::from_str(text).map_err(|e| PersistenceError::Corrupt(e.to_string()))?;
    migrate(raw.schema_version, raw.state)
}

/// Apply all pending migrations and decode the result.
pub fn migrate(version: u32, mut state: Value) -> Result<EngagementState, PersistenceError> {
    if version == 0 {
        return Err(PersistenceError::Corrupt("schema_version 0".into()));
    }
    if version > CURRENT_SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion {
            found: version,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    // Apply migrations sequentially
    if version < 2 {
        migrate_v2(&mut state)?;
        tracing::info!(from = version, to = 2, "migrated state document");
    }
    if version < 3 {
        migrate_v3(&mut state)?;
        tracing::info!(from = version.max(2), to = 3, "migrated state document");
    }

    serde_json::from_value(state).map_err(|e| PersistenceError::Corrupt(e.to_string()))
}

/// Migration v2: structured streak, hourly buckets, pattern counters.
///
/// Changes:
/// - `quality_streak`: bare integer -> `{current, best}` (best seeded from current)
/// - `hourly_buckets`: added, rebuilt from the ledger
/// - `patterns`: added, zeroed
/// - `revision`, `scored_revision`: added, start at 0
fn migrate_v2(state: &mut Value) -> Result<(), PersistenceError> {
    let obj = state
        .as_object_mut()
        .ok_or_else(|| PersistenceError::Corrupt("state is not an object".into()))?;

    let streak = match obj.get("quality_streak") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(other) => {
            return Err(PersistenceError::Corrupt(format!(
                "v1 quality_streak must be an integer, found {other}"
            )))
        }
        None => 0,
    };
    obj.insert(
        "quality_streak".into(),
        json!({ "current": streak, "best": streak }),
    );

    let buckets = rebuild_hourly_buckets(obj);
    obj.insert("hourly_buckets".into(), serde_json::to_value(buckets)?);
    obj.entry("patterns").or_insert_with(|| {
        json!({ "mindless_scroll_count": 0, "course_corrections": 0, "nudges_sent": 0 })
    });
    obj.entry("revision").or_insert(json!(0));
    obj.entry("scored_revision").or_insert(json!(0));
    Ok(())
}

/// Migration v3: pattern detector session.
///
/// Changes:
/// - `session`: added, empty (no window, no cooldown, rotation at zero)
fn migrate_v3(state: &mut Value) -> Result<(), PersistenceError> {
    let obj = state
        .as_object_mut()
        .ok_or_else(|| PersistenceError::Corrupt("state is not an object".into()))?;
    if !obj.contains_key("session") {
        obj.insert(
            "session".into(),
            serde_json::to_value(PatternSession::default())?,
        );
    }
    Ok(())
}

fn rebuild_hourly_buckets(obj: &Map<String, Value>) -> [HourlyBucket; 24] {
    let mut buckets = [HourlyBucket::default(); 24];
    let Some(ratings) = obj.get("ratings").and_then(Value::as_array) else {
        return buckets;
    };
    for rating in ratings {
        let Some(hour) = rating.get("hour_of_day").and_then(Value::as_u64) else {
            continue;
        };
        let bucket = &mut buckets[(hour as usize) % 24];
        bucket.ratings += 1;
        match rating.get("outcome").and_then(Value::as_str) {
            Some("valuable") => bucket.valuable += 1,
            _ => bucket.skip += 1,
        }
        if rating.get("aligned").and_then(Value::as_bool) == Some(true) {
            bucket.aligned += 1;
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Category, Outcome, RatingEvent};
    use chrono::{FixedOffset, TimeZone, Utc};

    fn v1_document() -> String {
        json!({
            "schema_version": 1,
            "state": {
                "ratings": [
                    {
                        "id": "a",
                        "category": "health",
                        "aligned": true,
                        "outcome": "valuable",
                        "timestamp": "2026-03-01T09:15:00Z",
                        "hour_of_day": 9
                    },
                    {
                        "id": "b",
                        "category": "news",
                        "aligned": false,
                        "outcome": "skip",
                        "timestamp": "2026-03-01T09:20:00Z",
                        "hour_of_day": 9
                    }
                ],
                "screen_time": { "lifetime_secs": 600, "today_secs": 600, "day": "2026-03-01" },
                "moods": [],
                "streak_days": 1,
                "last_active_day": "2026-03-01",
                "quality_streak": 4,
                "wellness_score": 55,
                "score_history": [55],
                "last_scored_at": "2026-03-01T09:20:00Z",
                "daily_scores": [{ "day": "2026-03-01", "score": 55 }],
                "progression": {
                    "xp": 30,
                    "total_ratings": 2,
                    "total_valuable": 1,
                    "unlocked": ["first_rating"],
                    "completion_markers": [],
                    "challenges_completed": 0
                },
                "daily_challenge": null
            }
        })
        .to_string()
    }

    #[test]
    fn v1_document_migrates() {
        let state = decode(&v1_document()).unwrap();
        assert_eq!(state.quality_streak.current, 4);
        assert_eq!(state.quality_streak.best, 4);
        assert_eq!(state.hourly_buckets[9].ratings, 2);
        assert_eq!(state.hourly_buckets[9].valuable, 1);
        assert_eq!(state.hourly_buckets[9].aligned, 1);
        assert_eq!(state.hourly_buckets[9].skip, 1);
        assert_eq!(state.patterns.nudges_sent, 0);
        assert_eq!(state.revision, 0);
        assert_eq!(state.wellness_score, 55);
        assert_eq!(state.session, PatternSession::default());
    }

    #[test]
    fn v2_document_gains_empty_session() {
        let text = encode(&EngagementState::new()).unwrap();
        let mut value: Value = serde_json::from_str(&text).unwrap();
        value["schema_version"] = json!(2);
        value["state"].as_object_mut().unwrap().remove("session");

        let state = decode(&value.to_string()).unwrap();
        assert_eq!(state, EngagementState::new());
    }

    #[test]
    fn current_document_roundtrips() {
        let mut state = EngagementState::new();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        state.push_rating(RatingEvent::new(
            Category::Arts,
            false,
            Outcome::Valuable,
            at,
            FixedOffset::east_opt(0).unwrap(),
        ));
        let text = encode(&state).unwrap();
        assert!(text.contains("\"schema_version\":3"));
        assert_eq!(decode(&text).unwrap(), state);
    }

    #[test]
    fn newer_version_is_rejected() {
        let text = json!({ "schema_version": 99, "state": {} }).to_string();
        assert!(matches!(
            decode(&text),
            Err(PersistenceError::UnsupportedVersion { found: 99, supported: 3 })
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let state = EngagementState::new();
        let mut value: Value = serde_json::from_str(&encode(&state).unwrap()).unwrap();
        value["state"]["favourite_colour"] = json!("blue");
        assert!(matches!(
            decode(&value.to_string()),
            Err(PersistenceError::Corrupt(_))
        ));

        let mut envelope: Value = serde_json::from_str(&encode(&state).unwrap()).unwrap();
        envelope["extra"] = json!(true);
        assert!(decode(&envelope.to_string()).is_err());
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(decode("not json"), Err(PersistenceError::Corrupt(_))));
        assert!(matches!(
            decode(r#"{"schema_version":1,"state":{"quality_streak":"x"}}"#),
            Err(PersistenceError::Corrupt(_))
        ));
    }
}
