// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `hue_switchboard` library.
//!
//! This module provides the error hierarchy used across the library: input
//! validation, name lookup, button addressing, remote bridge communication,
//! document parsing and the local cache.
//!
//! [`Error::PartialFailure`] means a behaviour instance was deleted on the
//! bridge and its replacement could not be created, leaving a switch
//! unprogrammed. It is never retried.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation before any remote call was made.
    #[error("validation error: {0}")]
    Validation(#[from] ValueError),

    /// A human-entered name could not be resolved to one resource.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// A button slot could not be located in a behaviour instance.
    #[error("addressing error: {0}")]
    Addressing(#[from] AddressingError),

    /// The bridge rejected a request or could not be reached.
    #[error("remote API error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A document did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The local cache could not be read, refreshed or written.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A snapshot could not be stored or loaded.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The behaviour instance was deleted but the replacement could not be
    /// created. The switch is left unprogrammed and needs manual attention.
    #[error(
        "switch '{switch}' left unprogrammed: instance {deleted_instance} was deleted but recreation failed: {source}"
    )]
    PartialFailure {
        /// Display name of the affected switch.
        switch: String,
        /// Identifier of the instance that no longer exists on the bridge.
        deleted_instance: String,
        /// The failure reported by the create request.
        #[source]
        source: Box<ProtocolError>,
        /// Set when the cache file could not be saved after the delete. The
        /// in-memory cache no longer holds the instance either way.
        cache_error: Option<Box<Error>>,
    },
}

impl Error {
    /// Returns `true` if this error left a switch in a broken state.
    #[must_use]
    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::PartialFailure { .. })
    }
}

/// Errors related to input validation.
///
/// These occur when building actions or requests from malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("{field} {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Name of the constrained value.
        field: &'static str,
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The value that was provided.
        actual: i64,
    },

    /// A scene cycle needs at least two scenes.
    #[error("scene cycle requires at least 2 scenes, got {0} (use a single recall instead)")]
    SceneCycleTooShort(usize),

    /// A time-based schedule needs at least one slot.
    #[error("time-based schedule requires at least one slot")]
    EmptySchedule,

    /// A scene or resource identifier was empty.
    #[error("empty {0} identifier")]
    EmptyIdentifier(&'static str),

    /// Mutually exclusive options were combined.
    #[error("conflicting options: {0}")]
    Conflict(String),

    /// Nothing to program was requested.
    #[error("no action specified: {0}")]
    MissingAction(String),

    /// A zone or derived scene ended up without any light.
    #[error("no lights left in {0}")]
    NoLights(String),

    /// A control position that no switch exposes.
    #[error("invalid control position {0} (expected 1-4, 34 or 35)")]
    InvalidControlPosition(u16),

    /// A time slot string could not be parsed.
    #[error("invalid time slot '{input}': {reason}")]
    InvalidTimeSlot {
        /// The offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An unknown named system action.
    #[error("unknown system action: {0}")]
    UnknownSystemAction(String),
}

/// Errors raised while resolving human-entered names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No candidate matched the query.
    #[error("no {kind} matches '{query}'")]
    NotFound {
        /// What was being looked up (switch, scene, room, ...).
        kind: &'static str,
        /// The query as entered.
        query: String,
        /// Close names that might have been meant.
        suggestions: Vec<String>,
    },

    /// Several candidates matched equally well.
    #[error("'{query}' matches several {kind} candidates: {}", candidates.join(", "))]
    Ambiguous {
        /// What was being looked up.
        kind: &'static str,
        /// The query as entered.
        query: String,
        /// Every matching candidate name.
        candidates: Vec<String>,
    },
}

/// Errors raised while locating a button inside a behaviour instance.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressingError {
    /// The switch does not expose a button at this control position.
    #[error("switch has no button at control position {0}")]
    ButtonNotFound(u16),

    /// A button key has no entry in the button-resource table.
    ///
    /// This usually means the cached button resources are stale; refresh the
    /// cache before retrying.
    #[error("button '{0}' is missing from the button resource table")]
    AmbiguousAddressing(String),
}

/// Errors related to communication with the bridge.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The bridge answered with a non-success status.
    #[error("bridge returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The bridge reported errors inside a response envelope.
    #[error("bridge reported errors: {}", .0.join("; "))]
    Rejected(Vec<String>),

    /// The response envelope was not `{errors: [], data: [...]}`.
    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    /// The resource does not exist on the bridge.
    #[error("{resource} {id} not found on bridge")]
    ResourceNotFound {
        /// Resource type path segment.
        resource: String,
        /// Resource identifier.
        id: String,
    },

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The application key was rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Connection to the bridge failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

/// Errors related to parsing bridge and local documents.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Unexpected document shape.
    #[error("unexpected format: {0}")]
    UnexpectedFormat(String),
}

/// Errors related to the local cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No cache exists and it could not be fetched from the bridge.
    #[error("no local cache and refresh failed: {0}")]
    Unavailable(#[source] Box<ProtocolError>),

    /// Reading or writing the cache file failed.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache file exists but cannot be decoded.
    #[error("corrupt cache document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Errors related to stored room snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Reading or writing a snapshot file failed.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A snapshot file cannot be decoded.
    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        /// The offending file.
        path: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// No stored snapshot matches the query.
    #[error("no snapshot matches '{0}'")]
    NotFound(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            field: "hour",
            min: 0,
            max: 23,
            actual: 25,
        };
        assert_eq!(err.to_string(), "hour 25 is out of range [0, 23]");
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::SceneCycleTooShort(1).into();
        assert!(matches!(
            err,
            Error::Validation(ValueError::SceneCycleTooShort(1))
        ));
    }

    #[test]
    fn ambiguous_lists_every_candidate() {
        let err = LookupError::Ambiguous {
            kind: "switch",
            query: "office".to_string(),
            candidates: vec!["Office dimmer".to_string(), "Office door".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "'office' matches several switch candidates: Office dimmer, Office door"
        );
    }

    #[test]
    fn partial_failure_is_flagged() {
        let err = Error::PartialFailure {
            switch: "Hall".to_string(),
            deleted_instance: "abc".to_string(),
            source: Box::new(ProtocolError::Timeout(5000)),
            cache_error: None,
        };
        assert!(err.is_partial_failure());
        assert!(err.to_string().contains("left unprogrammed"));

        let other: Error = ProtocolError::Timeout(5000).into();
        assert!(!other.is_partial_failure());
    }

    #[test]
    fn addressing_error_display() {
        assert_eq!(
            AddressingError::ButtonNotFound(5).to_string(),
            "switch has no button at control position 5"
        );
    }
}
