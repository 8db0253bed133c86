pub mod activity;
pub mod config;
pub mod fetch;
pub mod progress;

mod session;

pub use session::{print_json, Session};
