// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge resource references and record accessors.
//!
//! Bridge resources are exchanged as JSON documents. The library keeps them
//! as [`serde_json::Value`] records so unknown fields survive a round trip
//! through the cache, and reads the few fields it needs through the helpers
//! in this module.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A typed pointer to another bridge resource (`{"rid": ..., "rtype": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource identifier.
    pub rid: String,
    /// Resource type name, e.g. `scene`, `room`, `zone`.
    pub rtype: String,
}

impl ResourceRef {
    /// Creates a reference.
    #[must_use]
    pub fn new(rid: impl Into<String>, rtype: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            rtype: rtype.into(),
        }
    }

    /// Creates a reference to a scene.
    #[must_use]
    pub fn scene(rid: impl Into<String>) -> Self {
        Self::new(rid, "scene")
    }

    /// Reads a reference out of a JSON object, if it has both fields.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let rid = value.get("rid")?.as_str()?;
        let rtype = value.get("rtype")?.as_str()?;
        Some(Self::new(rid, rtype))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rtype, self.rid)
    }
}

/// Resource types the library reads or writes on the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Individual lights.
    Light,
    /// Rooms.
    Room,
    /// Zones.
    Zone,
    /// Scenes.
    Scene,
    /// Physical devices.
    Device,
    /// Button services of switches.
    Button,
    /// Behaviour instances binding switches to their programming.
    BehaviorInstance,
    /// Battery state of devices.
    DevicePower,
    /// The bridge itself.
    Bridge,
}

impl ResourceType {
    /// Returns the path segment used by the bridge API.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Room => "room",
            Self::Zone => "zone",
            Self::Scene => "scene",
            Self::Device => "device",
            Self::Button => "button",
            Self::BehaviorInstance => "behavior_instance",
            Self::DevicePower => "device_power",
            Self::Bridge => "bridge",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Returns the `id` of a record.
#[must_use]
pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Returns `metadata.name` of a record.
#[must_use]
pub fn record_name(record: &Value) -> Option<&str> {
    record
        .get("metadata")
        .and_then(|m| m.get("name"))
        .and_then(Value::as_str)
}

/// Returns `metadata.name` of a record, or `"Unknown"`.
#[must_use]
pub fn display_name(record: &Value) -> String {
    record_name(record).unwrap_or("Unknown").to_string()
}

/// Returns the references listed under `children` of a room or zone.
#[must_use]
pub fn children(record: &Value) -> Vec<ResourceRef> {
    record
        .get("children")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(ResourceRef::from_value).collect())
        .unwrap_or_default()
}

/// Returns the identifiers of children of type `device`.
#[must_use]
pub fn child_device_ids(record: &Value) -> Vec<String> {
    children(record)
        .into_iter()
        .filter(|c| c.rtype == "device")
        .map(|c| c.rid)
        .collect()
}

/// Reads a nested reference such as `owner` or `group`.
#[must_use]
pub fn nested_ref(record: &Value, field: &str) -> Option<ResourceRef> {
    record.get(field).and_then(ResourceRef::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_ref_from_value() {
        let value = json!({"rid": "abc", "rtype": "scene"});
        assert_eq!(
            ResourceRef::from_value(&value),
            Some(ResourceRef::scene("abc"))
        );
        assert_eq!(ResourceRef::from_value(&json!({"rid": "abc"})), None);
    }

    #[test]
    fn resource_type_paths() {
        assert_eq!(ResourceType::BehaviorInstance.path(), "behavior_instance");
        assert_eq!(ResourceType::DevicePower.to_string(), "device_power");
    }

    #[test]
    fn record_accessors() {
        let room = json!({
            "id": "room-1",
            "metadata": {"name": "Office"},
            "children": [
                {"rid": "dev-1", "rtype": "device"},
                {"rid": "light-1", "rtype": "light"},
                {"rid": "dev-2", "rtype": "device"}
            ]
        });
        assert_eq!(record_id(&room), Some("room-1"));
        assert_eq!(record_name(&room), Some("Office"));
        assert_eq!(child_device_ids(&room), vec!["dev-1", "dev-2"]);
        assert_eq!(display_name(&json!({})), "Unknown");
    }
}
