//! Settings store: the saved roster and topic.
//!
//! The record is a single JSON document `{ "personas": [...], "topic": "..." }`.
//! It is read once at startup and written whenever the roster changes and is
//! non-empty. Anything unreadable on disk is logged and treated as absent.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::roster::Roster;
use super::types::Persona;

// ─────────────────────────────────────────────────────────────────
// Stored Record
// ─────────────────────────────────────────────────────────────────

/// What gets persisted between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSettings {
    pub roster: Roster,
    pub topic: String,
}

#[derive(Serialize, Deserialize)]
struct SettingsRecord {
    personas: Vec<Persona>,
    #[serde(default)]
    topic: String,
}

// ─────────────────────────────────────────────────────────────────
// Settings Store
// ─────────────────────────────────────────────────────────────────

/// File-backed store for [`StoredSettings`].
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved settings. Missing or malformed data yields `None`.
    pub fn load(&self) -> Option<StoredSettings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No saved settings");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read saved settings, ignoring");
                return None;
            }
        };

        let record: SettingsRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed saved settings, ignoring");
                return None;
            }
        };

        match Roster::from_personas(record.personas) {
            Ok(roster) => {
                debug!(personas = roster.len(), "Loaded saved settings");
                Some(StoredSettings {
                    roster,
                    topic: record.topic,
                })
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Invalid saved roster, ignoring");
                None
            }
        }
    }

    /// Load saved settings, or start from an empty roster and topic.
    pub fn load_or_default(&self) -> StoredSettings {
        self.load().unwrap_or_default()
    }

    /// Persist the settings. Returns `false` without touching the file when
    /// the roster is empty.
    pub fn save(&self, settings: &StoredSettings) -> Result<bool> {
        if settings.roster.is_empty() {
            debug!("Roster is empty, settings not saved");
            return Ok(false);
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let record = SettingsRecord {
            personas: settings.roster.as_slice().to_vec(),
            topic: settings.topic.clone(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        // Write beside the target, then rename over it
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| Error::IoWrite {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::IoWrite {
            path: self.path.clone(),
            source: e,
        })?;

        info!(
            path = %self.path.display(),
            personas = settings.roster.len(),
            "Settings saved"
        );
        Ok(true)
    }

    /// Delete the saved record. Returns `false` if there was nothing to delete.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Saved settings removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::IoWrite {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
