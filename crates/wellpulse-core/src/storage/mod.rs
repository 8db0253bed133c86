mod config;
pub mod migrations;
mod persistence;

pub use config::{CacheConfig, Config, ContentConfig, PatternsConfig, ScoringConfig, TickConfig};
pub use persistence::{JsonFileStore, MemoryStore, StateStore};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/wellpulse[-dev]/` based on WELLPULSE_ENV.
///
/// Set WELLPULSE_ENV=dev to use development data directory.
/// WELLPULSE_DATA_DIR overrides both.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var("WELLPULSE_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env =
                std::env::var("WELLPULSE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("wellpulse-dev")
            } else {
                base_dir.join("wellpulse")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
