//! Load-apply-persist cycle shared by the state-changing commands.

use serde::Serialize;
use wellpulse_core::{Config, EngagementEngine, Event, JsonFileStore};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// One CLI invocation's view of the engine.
pub struct Session {
    pub engine: EngagementEngine,
    store: JsonFileStore,
    events: Vec<Event>,
}

impl Session {
    /// Load config and saved state. Load warnings are kept and reported
    /// alongside the command's own events.
    pub fn open() -> wellpulse_core::error::Result<Self> {
        let config = Config::load()?;
        let store = JsonFileStore::open_default()?.with_quota(config.state_quota_bytes);
        let (engine, events) = EngagementEngine::load(config, &store);
        Ok(Self {
            engine,
            store,
            events,
        })
    }

    pub fn record(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Persist and return everything the invocation produced.
    pub fn finish(mut self) -> Vec<Event> {
        let outcome = self.engine.persist(&mut self.store);
        self.events.extend(outcome.warning());
        self.events
    }

    /// Persist and print the events.
    pub fn finish_and_print(self) -> CmdResult {
        print_json(&self.finish())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
