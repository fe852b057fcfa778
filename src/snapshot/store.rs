// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapshot files on disk.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::Snapshot;
use crate::error::SnapshotError;

/// Builds the file name of a snapshot: `YYYY-MM-DD_HH-MM_<room>.json`.
///
/// Characters other than letters, digits, spaces, `-` and `_` become `_`,
/// then spaces become `_`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use hue_switchboard::snapshot::snapshot_file_name;
///
/// let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).unwrap();
/// assert_eq!(
///     snapshot_file_name("Kid's room", at),
///     "2025-03-14_09-05_Kid_s_room.json"
/// );
/// ```
#[must_use]
pub fn snapshot_file_name(room_name: &str, saved_at: DateTime<Utc>) -> String {
    let safe: String = room_name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{safe}.json", saved_at.format("%Y-%m-%d_%H-%M"))
}

/// Directory of write-once snapshot files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the snapshot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a snapshot and returns its path.
    ///
    /// A file with the same name is never overwritten; a numeric suffix is
    /// appended instead.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Io` if the file cannot be written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let name = snapshot_file_name(snapshot.room_name(), snapshot.saved_at);
        let json = serde_json::to_string_pretty(snapshot).map_err(|source| {
            SnapshotError::Corrupt {
                path: self.dir.join(&name).display().to_string(),
                source,
            }
        })?;

        // Claiming the name with `create_new` keeps concurrent saves apart.
        let stem = name.trim_end_matches(".json");
        let mut path = self.dir.join(&name);
        let mut suffix = 2;
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    path = self.dir.join(format!("{stem}_{suffix}.json"));
                    suffix += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        if let Err(e) = file.write_all(json.as_bytes()).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        tracing::info!(
            path = %path.display(),
            room = snapshot.room_name(),
            behaviours = snapshot.summary.behaviour_count,
            "Snapshot saved"
        );
        Ok(path)
    }

    /// Reads a snapshot file.
    ///
    /// # Errors
    ///
    /// - `SnapshotError::NotFound` if the file does not exist
    /// - `SnapshotError::Io` if it cannot be read
    /// - `SnapshotError::Corrupt` if it cannot be decoded
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Snapshot, SnapshotError> {
        let path = path.as_ref();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map_err(|source| SnapshotError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }

    /// Lists snapshot files, newest first.
    ///
    /// File names start with the capture time, so name order is time order.
    /// A missing directory lists as empty.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Io` if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<PathBuf>, SnapshotError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }

    /// Returns the newest snapshot whose room part contains `fragment`,
    /// compared case-insensitively with spaces read as `_`.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotFound` if no file matches.
    pub fn latest_for(&self, fragment: &str) -> Result<PathBuf, SnapshotError> {
        let needle = fragment.trim().to_lowercase().replace(' ', "_");
        self.list()?
            .into_iter()
            .find(|path| room_part(path).is_some_and(|room| room.contains(&needle)))
            .ok_or_else(|| SnapshotError::NotFound(fragment.to_string()))
    }

    /// Resolves a user argument: an existing path, a file name inside the
    /// store, or a room fragment.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::NotFound` if nothing matches.
    pub fn resolve(&self, arg: &str) -> Result<PathBuf, SnapshotError> {
        let direct = PathBuf::from(arg);
        if direct.is_file() {
            return Ok(direct);
        }
        let inside = self.dir.join(arg);
        if inside.is_file() {
            return Ok(inside);
        }
        self.latest_for(arg)
    }
}

/// Returns the lowercased room part of a snapshot file name, the text after
/// the date and time.
fn room_part(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.splitn(3, '_');
    parts.next()?;
    parts.next()?;
    parts.next().map(str::to_lowercase)
}
