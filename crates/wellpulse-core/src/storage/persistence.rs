//! State persistence contract and stores.
//!
//! The engine only sees [`StateStore`]. Two stores ship with the crate:
//!
//! | Store           | Backing                     | Use                 |
//! |-----------------|-----------------------------|---------------------|
//! | `JsonFileStore` | `{data_dir}/state.json`     | CLI and desktop     |
//! | `MemoryStore`   | an in-process `String`      | tests and embedding |
//!
//! Both enforce an optional byte quota so callers can exercise the
//! compaction path.

use std::path::{Path, PathBuf};

use super::data_dir;
use super::migrations;
use crate::error::{ConfigError, PersistenceError};
use crate::state::EngagementState;

/// Load/save contract for engagement state.
pub trait StateStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<EngagementState>, PersistenceError>;

    fn save(&mut self, state: &EngagementState) -> Result<(), PersistenceError>;
}

fn check_quota(size: usize, limit: Option<usize>) -> Result<(), PersistenceError> {
    match limit {
        Some(limit) if size > limit => Err(PersistenceError::QuotaExceeded { size, limit }),
        _ => Ok(()),
    }
}

// ── File store ───────────────────────────────────────────────────────

/// JSON document on disk, written via a temp file and rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    max_bytes: Option<usize>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: None,
        }
    }

    /// `state.json` in the default data directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::new(data_dir()?.join("state.json")))
    }

    pub fn with_quota(mut self, max_bytes: Option<usize>) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<EngagementState>, PersistenceError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        migrations::decode(&text).map(Some)
    }

    fn save(&mut self, state: &EngagementState) -> Result<(), PersistenceError> {
        let text = migrations::encode(state)?;
        check_quota(text.len(), self.max_bytes)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), revision = state.revision, "state saved");
        Ok(())
    }
}

// ── Memory store ─────────────────────────────────────────────────────

/// Keeps the encoded document in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
    max_bytes: Option<usize>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(max_bytes: usize) -> Self {
        Self {
            max_bytes: Some(max_bytes),
            ..Self::default()
        }
    }

    /// Seed with a raw document, e.g. one written by an older schema.
    pub fn from_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<EngagementState>, PersistenceError> {
        self.document
            .as_deref()
            .map(migrations::decode)
            .transpose()
    }

    fn save(&mut self, state: &EngagementState) -> Result<(), PersistenceError> {
        let text = migrations::encode(state)?;
        check_quota(text.len(), self.max_bytes)?;
        self.document = Some(text);
        self.saves += 1;
        Ok(())
    }
}
