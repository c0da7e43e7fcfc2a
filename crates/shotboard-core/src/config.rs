//! Runtime configuration.
//!
//! Values come from defaults, then an optional JSON file, then environment
//! variables, each layer overriding the previous one.

use crate::paths;
use crate::storage::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the external-store root directory.
pub const ENV_SCREENSHOT_DIR: &str = "SHOTBOARD_SCREENSHOT_DIR";
/// Environment variable for the scan period in seconds.
pub const ENV_SCAN_INTERVAL: &str = "SHOTBOARD_SCAN_INTERVAL_SECS";
/// Environment variable for the deletion reconcile period in seconds.
pub const ENV_RECONCILE_INTERVAL: &str = "SHOTBOARD_RECONCILE_INTERVAL_SECS";

pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Root directory in the external store, before sanitization.
    pub screenshot_dir: Option<String>,
    pub scan_interval_secs: u64,
    pub reconcile_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            screenshot_dir: None,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a JSON config; missing fields keep their defaults.
    pub fn from_json(json: &str) -> StorageResult<Self> {
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn load(path: &Path) -> StorageResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Apply overrides looked up by environment variable name.
    ///
    /// Unparseable intervals are ignored with a warning.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(ENV_SCREENSHOT_DIR) {
            self.screenshot_dir = Some(dir);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_SCAN_INTERVAL) {
            self.scan_interval_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_RECONCILE_INTERVAL) {
            self.reconcile_interval_secs = secs;
        }
        self
    }

    /// Sanitized external-store root.
    pub fn root(&self) -> String {
        paths::normalize_root(self.screenshot_dir.as_deref())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs.max(1))
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            log::warn!("Ignoring {}={:?}: {}", key, raw, e);
            None
        }
    }
}
