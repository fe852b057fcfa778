// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Room snapshots for backup, comparison and restore.
//!
//! A [`Snapshot`] captures one room from the cache: the room record, the
//! lights owned by its devices, the scenes grouped under it and every
//! behaviour instance whose `where` references include it. Snapshots are
//! written once by [`SnapshotStore`] and never modified; [`diff`] compares
//! two of them and [`Restorer`] replays the behaviour instances of one.

mod diff;
mod restore;
mod store;

pub use diff::{
    BehaviourChange, ButtonChange, ButtonDiff, DiffOptions, FieldChange, ItemChange, ItemRef,
    RoomDiff, SectionDiff, StructuredDiff, diff,
};
pub use restore::{
    PlannedInstance, RestoreFailure, RestorePlan, RestoreReport, RestoredInstance, Restorer,
};
pub use store::{SnapshotStore, snapshot_file_name};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::extract_room_references;
use crate::cache::{BridgeCache, CacheDocument, Collection};
use crate::error::LookupError;
use crate::resolve::resolve_name;
use crate::types::{child_device_ids, display_name, nested_ref, record_id, record_name};

/// Counts stored alongside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Room display name.
    pub room_name: String,
    /// Number of lights.
    pub light_count: usize,
    /// Number of scenes.
    pub scene_count: usize,
    /// Number of behaviour instances.
    pub behaviour_count: usize,
    /// Number of devices in the room.
    pub device_count: usize,
}

/// A point-in-time capture of one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the capture was taken.
    pub saved_at: DateTime<Utc>,
    /// The room record.
    pub room: Value,
    /// Lights owned by devices in the room.
    pub lights: Vec<Value>,
    /// Scenes grouped under the room.
    pub scenes: Vec<Value>,
    /// Behaviour instances referencing the room.
    pub behaviours: Vec<Value>,
    /// Counts.
    pub summary: SnapshotSummary,
}

impl Snapshot {
    /// Captures the room named `room_name` from the cache.
    ///
    /// The name is resolved like every other name: exact, prefix, substring,
    /// then similarity. The cache is read as is; refresh it first if needed.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` if the name matches no or several rooms.
    pub fn capture(cache: &BridgeCache, room_name: &str) -> Result<Self, LookupError> {
        let rooms: Vec<(&str, &str)> = cache
            .cached(Collection::Rooms)
            .iter()
            .filter_map(|r| Some((record_id(r)?, record_name(r)?)))
            .collect();
        let room_id = resolve_name("room", room_name, &rooms)?;
        let room = cache
            .find(Collection::Rooms, room_id)
            .cloned()
            .unwrap_or_default();

        let empty = CacheDocument::default();
        let document = cache.document().unwrap_or(&empty);
        Ok(Self::of_room(document, room, Utc::now()))
    }

    /// Builds the snapshot of `room` as it appears in `document`.
    #[must_use]
    pub fn of_room(document: &CacheDocument, room: Value, saved_at: DateTime<Utc>) -> Self {
        let room_id = record_id(&room).unwrap_or_default().to_string();
        let devices = child_device_ids(&room);

        let lights: Vec<Value> = document
            .lights
            .iter()
            .filter(|light| {
                nested_ref(light, "owner").is_some_and(|owner| devices.contains(&owner.rid))
            })
            .cloned()
            .collect();

        let scenes: Vec<Value> = document
            .scenes
            .iter()
            .filter(|scene| nested_ref(scene, "group").is_some_and(|group| group.rid == room_id))
            .cloned()
            .collect();

        let behaviours: Vec<Value> = document
            .behaviours
            .iter()
            .filter(|behaviour| references_room(behaviour, &room_id))
            .cloned()
            .collect();

        let summary = SnapshotSummary {
            room_name: display_name(&room),
            light_count: lights.len(),
            scene_count: scenes.len(),
            behaviour_count: behaviours.len(),
            device_count: devices.len(),
        };

        Self {
            saved_at,
            room,
            lights,
            scenes,
            behaviours,
            summary,
        }
    }

    /// Builds the current state of the same room from the cache, looked up
    /// by identifier and then by exact name. `None` if the room is gone.
    #[must_use]
    pub fn current(&self, cache: &BridgeCache) -> Option<Self> {
        let rooms = cache.cached(Collection::Rooms);
        let room = record_id(&self.room)
            .and_then(|id| rooms.iter().find(|r| record_id(r) == Some(id)))
            .or_else(|| {
                rooms
                    .iter()
                    .find(|r| record_name(r) == Some(self.summary.room_name.as_str()))
            })?;

        let empty = CacheDocument::default();
        Some(Self::of_room(
            cache.document().unwrap_or(&empty),
            room.clone(),
            Utc::now(),
        ))
    }

    /// Returns the room display name.
    #[must_use]
    pub fn room_name(&self) -> &str {
        &self.summary.room_name
    }
}

fn references_room(behaviour: &Value, room_id: &str) -> bool {
    behaviour.get("configuration").is_some_and(|config| {
        extract_room_references(config)
            .iter()
            .any(|r| r.rtype == "room" && r.rid == room_id)
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{Value, json};

    use crate::cache::CacheDocument;

    pub fn cycle_button(ids: &[&str]) -> Value {
        json!({
            "on_short_release": {"scene_cycle_extended": {
                "slots": ids.iter().map(|id| json!([{"action": {"recall": {"rid": id, "rtype": "scene"}}}])).collect::<Vec<_>>(),
                "with_off": {"enabled": false}
            }},
            "where": [{"group": {"rid": "room-1", "rtype": "room"}}]
        })
    }

    pub fn document() -> CacheDocument {
        CacheDocument {
            rooms: vec![
                json!({
                    "id": "room-1",
                    "metadata": {"name": "Living room", "archetype": "living_room"},
                    "children": [
                        {"rid": "dev-lamp", "rtype": "device"},
                        {"rid": "dev-switch", "rtype": "device"}
                    ]
                }),
                json!({"id": "room-2", "metadata": {"name": "Kitchen"}, "children": []}),
            ],
            lights: vec![
                json!({
                    "id": "light-1",
                    "owner": {"rid": "dev-lamp", "rtype": "device"},
                    "metadata": {"name": "Floor lamp"},
                    "on": {"on": true},
                    "dimming": {"brightness": 50.0},
                    "color_temperature": {"mirek": 366}
                }),
                json!({"id": "light-2", "owner": {"rid": "dev-other"}, "metadata": {"name": "Hob"}}),
            ],
            scenes: vec![
                json!({"id": "s-a", "group": {"rid": "room-1", "rtype": "room"}, "metadata": {"name": "A"}, "actions": [{}], "auto_dynamic": false, "speed": 0.5}),
                json!({"id": "s-b", "group": {"rid": "room-1", "rtype": "room"}, "metadata": {"name": "B"}, "actions": [{}]}),
                json!({"id": "s-k", "group": {"rid": "room-2", "rtype": "room"}, "metadata": {"name": "K"}}),
            ],
            behaviours: vec![
                json!({
                    "id": "inst-1",
                    "script_id": "script-x",
                    "enabled": true,
                    "status": "running",
                    "metadata": {"name": "Living switch"},
                    "configuration": {
                        "device": {"rid": "dev-switch", "rtype": "device"},
                        "button1": cycle_button(&["s-a", "s-b", "s-c"])
                    }
                }),
                json!({"id": "inst-2", "configuration": {"where": [{"group": {"rid": "room-2", "rtype": "room"}}]}}),
            ],
            ..CacheDocument::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StalenessPolicy;

    #[test]
    fn capture_selects_room_members() {
        let cache = BridgeCache::from_document(fixtures::document(), StalenessPolicy::default());
        let snapshot = Snapshot::capture(&cache, "living").unwrap();

        assert_eq!(snapshot.room_name(), "Living room");
        assert_eq!(snapshot.lights.len(), 1);
        assert_eq!(snapshot.scenes.len(), 2);
        assert_eq!(snapshot.behaviours.len(), 1);
        assert_eq!(snapshot.summary.device_count, 2);
        assert_eq!(record_id(&snapshot.behaviours[0]), Some("inst-1"));
    }

    #[test]
    fn capture_unknown_room_fails() {
        let cache = BridgeCache::from_document(fixtures::document(), StalenessPolicy::default());
        assert!(matches!(
            Snapshot::capture(&cache, "garage"),
            Err(LookupError::NotFound { .. })
        ));
    }

    #[test]
    fn current_follows_room_by_id() {
        let mut document = fixtures::document();
        let cache = BridgeCache::from_document(document.clone(), StalenessPolicy::default());
        let snapshot = Snapshot::capture(&cache, "living").unwrap();

        document.rooms[0]["metadata"]["name"] = "Lounge".into();
        let renamed = BridgeCache::from_document(document.clone(), StalenessPolicy::default());
        assert_eq!(snapshot.current(&renamed).unwrap().room_name(), "Lounge");

        document.rooms.remove(0);
        let gone = BridgeCache::from_document(document, StalenessPolicy::default());
        assert!(snapshot.current(&gone).is_none());
    }

    #[test]
    fn serde_shape() {
        let cache = BridgeCache::from_document(fixtures::document(), StalenessPolicy::default());
        let snapshot = Snapshot::capture(&cache, "kitchen").unwrap();
        let value = serde_json::to_value(&snapshot).unwrap();
        for key in ["saved_at", "room", "lights", "scenes", "behaviours", "summary"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["summary"]["room_name"], "Kitchen");
        let back: Snapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }
}
