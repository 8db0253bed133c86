//! Periodic tick scheduling.
//!
//! The scheduler itself is clock-free: callers pass `now`, and it reports
//! which kinds are due. A host loop, a test, or [`spawn_ticker`] drives it.
//!
//! | Kind             | Default interval | Work                                |
//! |------------------|------------------|-------------------------------------|
//! | `ScoreRefresh`   | 60s              | recompute when inputs changed       |
//! | `ChallengeCheck` | 300s             | regenerate on day change            |
//! | `SessionCheck`   | 30s              | micro-break nudge for long sessions |
//!
//! Missed intervals coalesce: a kind is reported once however late the call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::EngagementEngine;
use crate::events::Event;
use crate::storage::TickConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickKind {
    ScoreRefresh,
    ChallengeCheck,
    SessionCheck,
}

impl TickKind {
    pub const ALL: [TickKind; 3] = [
        TickKind::ScoreRefresh,
        TickKind::ChallengeCheck,
        TickKind::SessionCheck,
    ];

    fn index(self) -> usize {
        match self {
            TickKind::ScoreRefresh => 0,
            TickKind::ChallengeCheck => 1,
            TickKind::SessionCheck => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    interval: Duration,
    next_due: Option<DateTime<Utc>>,
    cancelled: bool,
}

/// Tracks when each tick kind is next due.
#[derive(Debug, Clone)]
pub struct TickScheduler {
    slots: [Slot; 3],
}

fn slot(secs: u64) -> Slot {
    Slot {
        interval: Duration::seconds(secs.max(1) as i64),
        next_due: None,
        cancelled: false,
    }
}

impl TickScheduler {
    pub fn new(config: &TickConfig) -> Self {
        Self {
            slots: [
                slot(config.score_refresh_secs),
                slot(config.challenge_check_secs),
                slot(config.session_check_secs),
            ],
        }
    }

    pub fn interval(&self, kind: TickKind) -> Duration {
        self.slots[kind.index()].interval
    }

    /// Shortest interval among active kinds, for host loops.
    pub fn min_interval(&self) -> Option<Duration> {
        self.slots
            .iter()
            .filter(|s| !s.cancelled)
            .map(|s| s.interval)
            .min()
    }

    /// Kinds due at `now`, in `TickKind::ALL` order.
    ///
    /// Each due kind is re-armed at `now + interval`, so several missed
    /// intervals still yield a single tick. A kind never seen before is due
    /// immediately.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<TickKind> {
        let mut due = Vec::new();
        for kind in TickKind::ALL {
            let slot = &mut self.slots[kind.index()];
            if slot.cancelled {
                continue;
            }
            if slot.next_due.map_or(true, |at| at <= now) {
                slot.next_due = Some(now + slot.interval);
                due.push(kind);
            }
        }
        due
    }

    pub fn next_due(&self, kind: TickKind) -> Option<DateTime<Utc>> {
        self.slots[kind.index()].next_due
    }

    /// Stop reporting `kind` until [`resume`](Self::resume).
    pub fn cancel(&mut self, kind: TickKind) {
        self.slots[kind.index()].cancelled = true;
    }

    pub fn resume(&mut self, kind: TickKind) {
        let slot = &mut self.slots[kind.index()];
        slot.cancelled = false;
        slot.next_due = None;
    }

    pub fn is_cancelled(&self, kind: TickKind) -> bool {
        self.slots[kind.index()].cancelled
    }
}

// ── Background ticker ────────────────────────────────────────────────

/// Handle to a running ticker task. Dropping it stops the task.
#[derive(Debug)]
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drive `engine`'s due ticks every `period` and forward emitted events.
///
/// The task ends on its own when the receiver is dropped.
pub fn spawn_ticker(
    engine: Arc<Mutex<EngagementEngine>>,
    period: std::time::Duration,
    events: mpsc::Sender<Event>,
) -> TickerHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(std::time::Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let emitted = {
                let mut engine = engine.lock().await;
                engine.run_due_ticks(Utc::now())
            };
            for event in emitted {
                if events.send(event).await.is_err() {
                    tracing::debug!("event receiver closed, stopping ticker");
                    return;
                }
            }
        }
    });
    TickerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn everything_is_due_on_first_call() {
        let mut scheduler = TickScheduler::new(&TickConfig::default());
        assert_eq!(scheduler.due(t0()), TickKind::ALL.to_vec());
        assert!(scheduler.due(t0()).is_empty());
    }

    #[test]
    fn kinds_follow_their_own_intervals() {
        let mut scheduler = TickScheduler::new(&TickConfig::default());
        scheduler.due(t0());

        assert_eq!(
            scheduler.due(t0() + Duration::seconds(30)),
            vec![TickKind::SessionCheck]
        );
        assert_eq!(
            scheduler.due(t0() + Duration::seconds(60)),
            vec![TickKind::ScoreRefresh, TickKind::SessionCheck]
        );
    }

    #[test]
    fn missed_intervals_coalesce() {
        let mut scheduler = TickScheduler::new(&TickConfig::default());
        scheduler.due(t0());
        let late = t0() + Duration::hours(3);
        assert_eq!(scheduler.due(late), TickKind::ALL.to_vec());
        assert!(scheduler.due(late + Duration::seconds(1)).is_empty());
        assert_eq!(
            scheduler.next_due(TickKind::ScoreRefresh),
            Some(late + Duration::seconds(60))
        );
    }

    #[test]
    fn cancelled_kinds_are_skipped() {
        let mut scheduler = TickScheduler::new(&TickConfig::default());
        scheduler.cancel(TickKind::SessionCheck);
        assert!(scheduler.is_cancelled(TickKind::SessionCheck));
        assert!(!scheduler.due(t0()).contains(&TickKind::SessionCheck));
        assert_eq!(scheduler.min_interval(), Some(Duration::seconds(60)));

        scheduler.resume(TickKind::SessionCheck);
        assert_eq!(scheduler.due(t0()), vec![TickKind::SessionCheck]);
    }
}
