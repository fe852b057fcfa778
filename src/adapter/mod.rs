// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Normalization of the two button addressing shapes.
//!
//! Behaviour instances store their buttons in one of two shapes:
//!
//! - **Legacy**: fixed keys `button1` to `button4`, plus `rotary` for dials.
//! - **Addressed**: a `buttons` map keyed by each button service's resource
//!   identifier. The control position lives on the button resource
//!   (`metadata.control_id`) and is looked up through a [`ButtonLookup`].
//!
//! The shape is inferred per instance and never mixed. The functions here give
//! the rest of the library one way to locate and walk button entries
//! regardless of shape.

mod assignments;
mod rooms;

pub use assignments::{SceneAssignment, scene_assignments};
pub use rooms::extract_room_references;

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::AddressingError;
use crate::types::{ControlPosition, record_id};

/// Key of the rotary entry in legacy-shape configurations.
pub const ROTARY_KEY: &str = "rotary";

const LEGACY_BUTTON_KEYS: [&str; 4] = ["button1", "button2", "button3", "button4"];

/// How an instance addresses its buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingShape {
    /// `button1`..`button4` and `rotary` keys.
    Legacy,
    /// A `buttons` map keyed by button resource identifier.
    Addressed,
}

impl AddressingShape {
    /// Infers the shape of a `configuration` document.
    #[must_use]
    pub fn detect(configuration: &Value) -> Self {
        if configuration.get("buttons").is_some() {
            Self::Addressed
        } else {
            Self::Legacy
        }
    }
}

/// Location of a button entry inside a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKey {
    /// Top-level key in a legacy configuration (`button3`, `rotary`).
    Legacy(String),
    /// Button resource identifier in an addressed configuration.
    Addressed(String),
}

impl SlotKey {
    /// Returns the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Legacy(key) | Self::Addressed(key) => key,
        }
    }

    /// Returns the entry this key points at.
    #[must_use]
    pub fn entry<'a>(&self, configuration: &'a Value) -> Option<&'a Value> {
        match self {
            Self::Legacy(key) => configuration.get(key),
            Self::Addressed(rid) => configuration.get("buttons")?.get(rid),
        }
    }

    /// Returns the entry this key points at, creating an empty object when
    /// it is missing.
    ///
    /// Returns `None` if the configuration (or its `buttons` map) is not an
    /// object.
    pub fn entry_mut<'a>(&self, configuration: &'a mut Value) -> Option<&'a mut Map<String, Value>> {
        let container = match self {
            Self::Legacy(_) => configuration.as_object_mut()?,
            Self::Addressed(_) => configuration
                .as_object_mut()?
                .entry("buttons")
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()?,
        };
        container
            .entry(self.as_str())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control positions of button resources, keyed by resource identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonLookup {
    positions: HashMap<String, u16>,
}

impl ButtonLookup {
    /// Builds the table from cached `button` records.
    ///
    /// Records without an identifier or `metadata.control_id` are skipped.
    #[must_use]
    pub fn from_records(records: &[Value]) -> Self {
        let positions = records
            .iter()
            .filter_map(|record| {
                let id = record_id(record)?;
                let control = record
                    .get("metadata")?
                    .get("control_id")?
                    .as_u64()
                    .and_then(|c| u16::try_from(c).ok())?;
                Some((id.to_string(), control))
            })
            .collect();
        Self { positions }
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, rid: impl Into<String>, control_id: u16) {
        self.positions.insert(rid.into(), control_id);
    }

    /// Returns the control position of a button resource.
    #[must_use]
    pub fn control_id(&self, rid: &str) -> Option<u16> {
        self.positions.get(rid).copied()
    }

    /// Returns the number of known buttons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if no buttons are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Locates the entry for `position` in a `configuration` document.
///
/// Legacy positions 1-4 always map to `button{k}`, whether or not the key is
/// present yet; dial positions map to `rotary` only when the switch has one.
/// Addressed configurations are scanned for the button resource whose
/// control position matches.
///
/// # Errors
///
/// - `AddressingError::ButtonNotFound` if no entry carries that position
/// - `AddressingError::AmbiguousAddressing` if no entry matched and at least
///   one key is missing from `lookup`; refresh the button resources first
///
/// # Examples
///
/// ```
/// use hue_switchboard::adapter::{ButtonLookup, SlotKey, resolve_button_slot};
/// use hue_switchboard::types::ControlPosition;
/// use serde_json::json;
///
/// let legacy = json!({"button1": {}, "button2": {}});
/// let key = resolve_button_slot(&legacy, ControlPosition::new(2).unwrap(), &ButtonLookup::default());
/// assert_eq!(key.unwrap(), SlotKey::Legacy("button2".into()));
/// ```
pub fn resolve_button_slot(
    configuration: &Value,
    position: ControlPosition,
    lookup: &ButtonLookup,
) -> Result<SlotKey, AddressingError> {
    match AddressingShape::detect(configuration) {
        AddressingShape::Legacy => {
            if position.is_rotary() {
                return if configuration.get(ROTARY_KEY).is_some() {
                    Ok(SlotKey::Legacy(ROTARY_KEY.to_string()))
                } else {
                    Err(AddressingError::ButtonNotFound(position.value()))
                };
            }
            Ok(SlotKey::Legacy(position.legacy_key()))
        }
        AddressingShape::Addressed => {
            let buttons = configuration
                .get("buttons")
                .and_then(Value::as_object)
                .ok_or(AddressingError::ButtonNotFound(position.value()))?;

            let mut unknown = None;
            for rid in buttons.keys() {
                match lookup.control_id(rid) {
                    Some(control) if control == position.value() => {
                        return Ok(SlotKey::Addressed(rid.clone()));
                    }
                    Some(_) => {}
                    None => unknown = unknown.or(Some(rid)),
                }
            }

            match unknown {
                Some(rid) => Err(AddressingError::AmbiguousAddressing(rid.clone())),
                None => Err(AddressingError::ButtonNotFound(position.value())),
            }
        }
    }
}

/// One button entry of a configuration, with its position when known.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonEntry<'a> {
    /// Where the entry lives.
    pub key: SlotKey,
    /// Control position, `None` for addressed keys missing from the lookup.
    pub position: Option<u16>,
    /// The entry document.
    pub entry: &'a Value,
}

/// Lists every button entry of a configuration in control order.
///
/// Entries whose position is unknown sort last.
#[must_use]
pub fn button_entries<'a>(configuration: &'a Value, lookup: &ButtonLookup) -> Vec<ButtonEntry<'a>> {
    let mut entries = Vec::new();

    match AddressingShape::detect(configuration) {
        AddressingShape::Legacy => {
            for (index, key) in (1u16..).zip(LEGACY_BUTTON_KEYS) {
                if let Some(entry) = configuration.get(key) {
                    entries.push(ButtonEntry {
                        key: SlotKey::Legacy(key.to_string()),
                        position: Some(index),
                        entry,
                    });
                }
            }
        }
        AddressingShape::Addressed => {
            if let Some(buttons) = configuration.get("buttons").and_then(Value::as_object) {
                for (rid, entry) in buttons {
                    entries.push(ButtonEntry {
                        key: SlotKey::Addressed(rid.clone()),
                        position: lookup.control_id(rid),
                        entry,
                    });
                }
            }
        }
    }

    if let Some(entry) = configuration.get(ROTARY_KEY) {
        entries.push(ButtonEntry {
            key: SlotKey::Legacy(ROTARY_KEY.to_string()),
            position: Some(ControlPosition::ROTARY_ROTATE.value()),
            entry,
        });
    }

    entries.sort_by_key(|e| (e.position.is_none(), e.position, e.key.clone()));
    entries
}

/// Returns `true` if a behaviour instance programs switch buttons.
#[must_use]
pub fn is_switch_instance(instance: &Value) -> bool {
    instance.get("configuration").is_some_and(|config| {
        config.get("buttons").is_some() || LEGACY_BUTTON_KEYS.iter().any(|k| config.get(k).is_some())
    })
}

/// Returns the device a behaviour instance is bound to.
#[must_use]
pub fn instance_device_id(instance: &Value) -> Option<&str> {
    instance
        .get("configuration")?
        .get("device")?
        .get("rid")?
        .as_str()
}
