use chrono::Utc;
use clap::Args;
use wellpulse_core::{Category, MoodLevel, Outcome};

use super::session::CmdResult;
use super::Session;

#[derive(Args)]
pub struct RateArgs {
    /// Content category (health, education, science, ...)
    #[arg(long, short)]
    category: Category,
    /// valuable or skip
    #[arg(long, short)]
    outcome: Outcome,
    /// Whether the item serves your goals; derived from `goals` when omitted
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    aligned: Option<bool>,
}

pub fn rate(args: RateArgs) -> CmdResult {
    let mut session = Session::open()?;
    let aligned = args
        .aligned
        .unwrap_or_else(|| session.engine.config().is_goal(args.category));
    let events = session
        .engine
        .record_rating(args.category, aligned, args.outcome, Utc::now());
    session.record(events);
    session.finish_and_print()
}

pub fn mood(level: MoodLevel) -> CmdResult {
    let mut session = Session::open()?;
    let events = session.engine.log_mood(level, Utc::now());
    session.record(events);
    session.finish_and_print()
}

pub fn screen_time(seconds: u64) -> CmdResult {
    let mut session = Session::open()?;
    let events = session.engine.add_screen_time(seconds, Utc::now());
    session.record(events);
    session.finish_and_print()
}

pub fn tick() -> CmdResult {
    let mut session = Session::open()?;
    let events = session.engine.tick(Utc::now());
    session.record(events);
    session.finish_and_print()
}
