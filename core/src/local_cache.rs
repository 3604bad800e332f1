//! Durable on-device copy of the user's state, stored as JSON documents under
//! fixed keys in the SQLite `kv_store` table.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db::Database;
use crate::models::{History, Snapshot, Targets};
use crate::workout::{WorkoutTemplate, default_templates};

pub const HISTORY_KEY: &str = "nutrition_history";
pub const TARGETS_KEY: &str = "targets";
pub const ONBOARDED_KEY: &str = "has_onboarded";
pub const TEMPLATES_KEY: &str = "workout_templates";

pub struct LocalCache {
    db: Database,
}

impl LocalCache {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Overwrite both keys unconditionally.
    pub fn save_local(&mut self, history: &History, targets: &Targets) -> Result<()> {
        let history = serde_json::to_string(history).context("Failed to encode history")?;
        let targets = serde_json::to_string(targets).context("Failed to encode targets")?;
        self.db
            .set_values(&[(HISTORY_KEY, history.as_str()), (TARGETS_KEY, targets.as_str())])
    }

    /// Last saved state. Missing or unreadable keys fall back to defaults.
    #[must_use]
    pub fn load_local(&self) -> Snapshot {
        Snapshot {
            history: self.read_or_default(HISTORY_KEY),
            targets: self.read_or_default(TARGETS_KEY),
        }
    }

    #[must_use]
    pub fn has_onboarded(&self) -> bool {
        self.read::<bool>(ONBOARDED_KEY).unwrap_or(false)
    }

    pub fn mark_onboarded(&self) -> Result<()> {
        self.db.set_value(ONBOARDED_KEY, "true")
    }

    /// Saved routines, or the built-in ones when none were ever saved.
    #[must_use]
    pub fn load_templates(&self) -> Vec<WorkoutTemplate> {
        self.read(TEMPLATES_KEY).unwrap_or_else(default_templates)
    }

    pub fn save_templates(&self, templates: &[WorkoutTemplate]) -> Result<()> {
        self.write(TEMPLATES_KEY, templates)
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json =
            serde_json::to_string(value).with_context(|| format!("Failed to encode '{key}'"))?;
        self.db.set_value(key, &json)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.db.get_value(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Local cache read of '{key}' failed: {e:#}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring malformed '{key}' in local cache: {e}");
                None
            }
        }
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.read(key).unwrap_or_default()
    }
}
