// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! On-disk cache document.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::CacheDocument;
use crate::error::CacheError;

/// Reads and writes the cache document at a fixed path.
///
/// Writes replace the whole file: the document is written to a temporary file
/// next to the target and renamed over it, so a reader sees either the old or
/// the new document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Creates a store for the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be read and
    /// `CacheError::Corrupt` if it cannot be decoded.
    pub fn load(&self) -> Result<Option<CacheDocument>, CacheError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Writes the document.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be written.
    pub fn save(&self, document: &CacheDocument) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cache".to_string());
        let temp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        if let Err(e) = fs::write(&temp, json).and_then(|()| fs::rename(&temp, &self.path)) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), "Cache saved");
        Ok(())
    }
}
