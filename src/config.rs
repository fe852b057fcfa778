// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted user settings.
//!
//! Settings live in `hue-switchboard/settings.json` under the platform
//! configuration directory. A missing or unreadable file yields the
//! defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::{BridgeCache, StalenessPolicy};
use crate::error::{Result, ValueError};
#[cfg(feature = "http")]
use crate::protocol::BridgeConfig;
use crate::snapshot::SnapshotStore;

const APP_DIR: &str = "hue-switchboard";

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Bridge address.
    pub bridge_host: Option<String>,
    /// Application key issued by the bridge.
    pub application_key: Option<String>,
    /// Cache document path. Defaults to `cache.json` next to the settings.
    pub cache_path: Option<PathBuf>,
    /// Hours after which the cache is refreshed.
    pub cache_max_age_hours: i64,
    /// Snapshot directory. Defaults to `snapshots` next to the settings.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bridge_host: None,
            application_key: None,
            cache_path: None,
            cache_max_age_hours: StalenessPolicy::DEFAULT_MAX_AGE_HOURS,
            snapshot_dir: None,
        }
    }
}

impl Settings {
    /// Returns the directory holding settings, cache and snapshots.
    #[must_use]
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR))
    }

    /// Returns the default settings file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        Self::app_dir().map(|dir| dir.join("settings.json"))
    }

    /// Loads the settings from the default path.
    ///
    /// Returns the defaults if the file is missing or cannot be read.
    #[must_use]
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            tracing::warn!("Could not determine config directory");
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Loads the settings from `path`, falling back to the defaults.
    #[must_use]
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => {
                    tracing::debug!(path = %path.display(), "Settings loaded");
                    settings
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to parse settings");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to read settings");
                Self::default()
            }
        }
    }

    /// Saves the settings to the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be determined or the file
    /// cannot be written.
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = Self::default_path() else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config directory",
            ));
        };
        self.save_to(&path)
    }

    /// Saves the settings to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Sets the bridge address and key.
    #[must_use]
    pub fn with_bridge(mut self, host: impl Into<String>, application_key: impl Into<String>) -> Self {
        self.bridge_host = Some(host.into());
        self.application_key = Some(application_key.into());
        self
    }

    /// Sets the cache path.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Sets the snapshot directory.
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Builds the HTTP client configuration.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` if the host or key is not set.
    #[cfg(feature = "http")]
    pub fn bridge_config(&self) -> std::result::Result<BridgeConfig, ValueError> {
        let host = non_empty(self.bridge_host.as_deref()).ok_or(ValueError::EmptyIdentifier("bridge host"))?;
        let key = non_empty(self.application_key.as_deref())
            .ok_or(ValueError::EmptyIdentifier("application key"))?;
        Ok(BridgeConfig::new(host, key))
    }

    /// Returns the cache staleness policy.
    #[must_use]
    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy::default().with_max_age_hours(self.cache_max_age_hours)
    }

    /// Returns the configured or default cache path.
    #[must_use]
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path
            .clone()
            .or_else(|| Self::app_dir().map(|dir| dir.join("cache.json")))
    }

    /// Returns the configured or default snapshot directory.
    #[must_use]
    pub fn resolved_snapshot_dir(&self) -> Option<PathBuf> {
        self.snapshot_dir
            .clone()
            .or_else(|| Self::app_dir().map(|dir| dir.join("snapshots")))
    }

    /// Opens the cache at the resolved path, or an in-memory cache when no
    /// path can be determined.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cache` if the cache file exists but cannot be read.
    pub fn open_cache(&self) -> Result<BridgeCache> {
        match self.resolved_cache_path() {
            Some(path) => BridgeCache::open(path, self.staleness_policy()),
            None => {
                tracing::warn!("No cache path available, keeping the cache in memory");
                Ok(BridgeCache::in_memory(self.staleness_policy()))
            }
        }
    }

    /// Returns the snapshot store at the resolved directory.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` if no directory can be
    /// determined.
    pub fn snapshot_store(&self) -> std::result::Result<SnapshotStore, ValueError> {
        self.resolved_snapshot_dir()
            .map(SnapshotStore::new)
            .ok_or(ValueError::EmptyIdentifier("snapshot directory"))
    }
}

#[cfg(feature = "http")]
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
