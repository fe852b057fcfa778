// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Comparison of two snapshots of the same room.
//!
//! Behaviour configurations are compared per button. When both sides hold a
//! scene-bearing action of the same kind, the scene identifiers are compared
//! as sets, so adding one scene to a cycle reads as `added: [D]` instead of
//! "configuration changed".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::Snapshot;
use crate::action::ObservedAction;
use crate::adapter::{ButtonLookup, SlotKey, button_entries};
use crate::cache::BridgeCache;
use crate::types::{child_device_ids, display_name, record_id};

const BRIGHTNESS_TOLERANCE: f64 = 0.5;
const SPEED_TOLERANCE: f64 = 0.01;

/// Switches for optional comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    light_details: bool,
}

impl DiffOptions {
    /// Also compares on/off, brightness and colour temperature of lights
    /// present on both sides.
    #[must_use]
    pub fn with_light_details(mut self, enabled: bool) -> Self {
        self.light_details = enabled;
        self
    }
}

/// A field whose value differs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Field name, e.g. `brightness`.
    pub field: String,
    /// Saved value.
    pub before: Value,
    /// Current value.
    pub after: Value,
}

impl FieldChange {
    fn new(field: &str, before: Value, after: Value) -> Self {
        Self {
            field: field.to_string(),
            before,
            after,
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.before, self.after)
    }
}

/// A light or scene present on both sides whose fields differ.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemChange {
    /// Resource identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Differing fields.
    pub changes: Vec<FieldChange>,
}

/// What changed on one button of a behaviour instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum ButtonChange {
    /// Scenes recalled by the same kind of action differ.
    Scenes {
        /// Scene identifiers only in the current state.
        added: Vec<String>,
        /// Scene identifiers only in the saved state.
        removed: Vec<String>,
    },
    /// Same scenes in a different order.
    Reordered,
    /// The short-press action kind changed.
    KindChanged {
        /// Saved action description.
        before: String,
        /// Current action description.
        after: String,
    },
    /// The button entry exists only in the current state.
    ButtonAdded,
    /// The button entry exists only in the saved state.
    ButtonRemoved,
    /// The entry differs in a way not covered above.
    Changed,
}

/// A change on one button, keyed by its configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonDiff {
    /// `button1`..`button4`, `rotary` or a button resource identifier.
    pub key: String,
    /// What changed.
    pub change: ButtonChange,
}

/// A behaviour instance present on both sides that differs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BehaviourChange {
    /// Instance identifier.
    pub id: String,
    /// Instance display name.
    pub name: String,
    /// `enabled` and `status` changes.
    pub changes: Vec<FieldChange>,
    /// Per-button changes.
    pub buttons: Vec<ButtonDiff>,
    /// Set when parts of the configuration outside the buttons differ.
    pub configuration_changed: bool,
}

/// Identifier and name of an added or removed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemRef {
    /// Resource identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Added, removed and changed resources of one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionDiff<C> {
    /// Only in the current state.
    pub added: Vec<ItemRef>,
    /// Only in the saved state.
    pub removed: Vec<ItemRef>,
    /// On both sides, with differences.
    pub changed: Vec<C>,
}

impl<C> Default for SectionDiff<C> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }
}

impl<C> SectionDiff<C> {
    /// Returns `true` if nothing was added, removed or changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Room-level changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoomDiff {
    /// The room no longer exists.
    pub deleted: bool,
    /// Name, archetype and device count changes.
    pub changes: Vec<FieldChange>,
}

impl RoomDiff {
    /// Returns `true` if the room is unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.deleted && self.changes.is_empty()
    }
}

/// Result of [`diff`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuredDiff {
    /// Room metadata.
    pub room: RoomDiff,
    /// Lights owned by room devices.
    pub lights: SectionDiff<ItemChange>,
    /// Scenes of the room.
    pub scenes: SectionDiff<ItemChange>,
    /// Behaviour instances referencing the room.
    pub behaviours: SectionDiff<BehaviourChange>,
}

impl StructuredDiff {
    /// Returns `true` if every section is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.room.is_empty()
            && self.lights.is_empty()
            && self.scenes.is_empty()
            && self.behaviours.is_empty()
    }

    /// The diff of a snapshot whose room has been deleted: every saved
    /// resource is reported as removed.
    #[must_use]
    pub fn room_deleted(saved: &Snapshot) -> Self {
        let removed =
            |items: &[Value]| -> Vec<ItemRef> { items.iter().filter_map(item_ref).collect() };
        Self {
            room: RoomDiff {
                deleted: true,
                changes: Vec::new(),
            },
            lights: SectionDiff {
                removed: removed(&saved.lights),
                ..SectionDiff::default()
            },
            scenes: SectionDiff {
                removed: removed(&saved.scenes),
                ..SectionDiff::default()
            },
            behaviours: SectionDiff {
                removed: removed(&saved.behaviours),
                ..SectionDiff::default()
            },
        }
    }
}

/// Compares a saved snapshot with a current one. Neither input is modified.
#[must_use]
pub fn diff(saved: &Snapshot, current: &Snapshot, options: DiffOptions) -> StructuredDiff {
    StructuredDiff {
        room: diff_room(&saved.room, &current.room),
        lights: diff_section(&saved.lights, &current.lights, |before, after| {
            if options.light_details {
                light_changes(before, after)
            } else {
                Vec::new()
            }
        }),
        scenes: diff_section(&saved.scenes, &current.scenes, scene_changes),
        behaviours: diff_behaviours(&saved.behaviours, &current.behaviours),
    }
}

impl Snapshot {
    /// Compares this snapshot with the room's current state in the cache.
    #[must_use]
    pub fn diff_against(&self, cache: &BridgeCache, options: DiffOptions) -> StructuredDiff {
        match self.current(cache) {
            Some(current) => diff(self, &current, options),
            None => StructuredDiff::room_deleted(self),
        }
    }
}

// ========================================================================
// Sections
// ========================================================================

fn item_ref(record: &Value) -> Option<ItemRef> {
    Some(ItemRef {
        id: record_id(record)?.to_string(),
        name: display_name(record),
    })
}

fn by_id(items: &[Value]) -> BTreeMap<&str, &Value> {
    items
        .iter()
        .filter_map(|item| Some((record_id(item)?, item)))
        .collect()
}

/// Splits two record lists into added, removed and common pairs.
fn pair_up<'a>(
    saved: &'a [Value],
    current: &'a [Value],
) -> (Vec<ItemRef>, Vec<ItemRef>, Vec<(&'a Value, &'a Value)>) {
    let before = by_id(saved);
    let after = by_id(current);

    let added = after
        .iter()
        .filter(|(id, _)| !before.contains_key(*id))
        .filter_map(|(_, v)| item_ref(v))
        .collect();
    let removed = before
        .iter()
        .filter(|(id, _)| !after.contains_key(*id))
        .filter_map(|(_, v)| item_ref(v))
        .collect();
    let common = before
        .iter()
        .filter_map(|(id, b)| after.get(id).map(|a| (*b, *a)))
        .collect();
    (added, removed, common)
}

fn diff_section(
    saved: &[Value],
    current: &[Value],
    compare: impl Fn(&Value, &Value) -> Vec<FieldChange>,
) -> SectionDiff<ItemChange> {
    let (added, removed, common) = pair_up(saved, current);
    let changed = common
        .into_iter()
        .filter_map(|(before, after)| {
            let changes = compare(before, after);
            if changes.is_empty() {
                return None;
            }
            Some(ItemChange {
                id: record_id(after).unwrap_or_default().to_string(),
                name: display_name(after),
                changes,
            })
        })
        .collect();
    SectionDiff {
        added,
        removed,
        changed,
    }
}

fn diff_room(saved: &Value, current: &Value) -> RoomDiff {
    let mut changes = Vec::new();
    push_if_different(&mut changes, "name", field(saved, "/metadata/name"), field(current, "/metadata/name"));
    push_if_different(
        &mut changes,
        "archetype",
        field(saved, "/metadata/archetype"),
        field(current, "/metadata/archetype"),
    );
    let (before, after) = (child_device_ids(saved).len(), child_device_ids(current).len());
    if before != after {
        changes.push(FieldChange::new("device_count", before.into(), after.into()));
    }
    RoomDiff {
        deleted: false,
        changes,
    }
}

fn light_changes(before: &Value, after: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    push_if_different(&mut changes, "on", field(before, "/on/on"), field(after, "/on/on"));
    push_if_beyond(
        &mut changes,
        "brightness",
        field(before, "/dimming/brightness"),
        field(after, "/dimming/brightness"),
        BRIGHTNESS_TOLERANCE,
    );
    push_if_different(
        &mut changes,
        "mirek",
        field(before, "/color_temperature/mirek"),
        field(after, "/color_temperature/mirek"),
    );
    changes
}

fn scene_changes(before: &Value, after: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    let auto_dynamic = |v: &Value| Value::Bool(v.get("auto_dynamic").and_then(Value::as_bool).unwrap_or(false));
    push_if_different(&mut changes, "auto_dynamic", auto_dynamic(before), auto_dynamic(after));

    let actions = |v: &Value| v.get("actions").and_then(Value::as_array).map_or(0, Vec::len);
    let (a, b) = (actions(before), actions(after));
    if a != b {
        changes.push(FieldChange::new("light_count", a.into(), b.into()));
    }

    push_if_beyond(
        &mut changes,
        "speed",
        field(before, "/speed"),
        field(after, "/speed"),
        SPEED_TOLERANCE,
    );
    changes
}

fn diff_behaviours(saved: &[Value], current: &[Value]) -> SectionDiff<BehaviourChange> {
    let (added, removed, common) = pair_up(saved, current);
    let changed = common
        .into_iter()
        .filter_map(|(before, after)| behaviour_change(before, after))
        .collect();
    SectionDiff {
        added,
        removed,
        changed,
    }
}

fn behaviour_change(before: &Value, after: &Value) -> Option<BehaviourChange> {
    if before == after {
        return None;
    }

    let mut changes = Vec::new();
    let enabled = |v: &Value| Value::Bool(v.get("enabled").and_then(Value::as_bool).unwrap_or(false));
    push_if_different(&mut changes, "enabled", enabled(before), enabled(after));
    push_if_different(&mut changes, "status", field(before, "/status"), field(after, "/status"));

    let empty = Value::Object(Map::new());
    let config_before = before.get("configuration").unwrap_or(&empty);
    let config_after = after.get("configuration").unwrap_or(&empty);
    let buttons = diff_buttons(config_before, config_after);
    let configuration_changed = outside_buttons(config_before) != outside_buttons(config_after);

    if changes.is_empty() && buttons.is_empty() && !configuration_changed {
        return None;
    }
    Some(BehaviourChange {
        id: record_id(after).unwrap_or_default().to_string(),
        name: display_name(after),
        changes,
        buttons,
        configuration_changed,
    })
}

// ========================================================================
// Buttons
// ========================================================================

fn diff_buttons(before: &Value, after: &Value) -> Vec<ButtonDiff> {
    let lookup = ButtonLookup::default();
    let saved: Vec<(SlotKey, &Value)> = button_entries(before, &lookup)
        .into_iter()
        .map(|e| (e.key, e.entry))
        .collect();
    let current: HashMap<SlotKey, &Value> = button_entries(after, &lookup)
        .into_iter()
        .map(|e| (e.key, e.entry))
        .collect();

    let mut out = Vec::new();
    for (key, entry) in &saved {
        let change = match current.get(key) {
            None => Some(ButtonChange::ButtonRemoved),
            Some(now) => button_change(entry, now),
        };
        if let Some(change) = change {
            out.push(ButtonDiff {
                key: key.to_string(),
                change,
            });
        }
    }

    let seen: HashSet<&SlotKey> = saved.iter().map(|(k, _)| k).collect();
    for entry in button_entries(after, &lookup) {
        if !seen.contains(&entry.key) {
            out.push(ButtonDiff {
                key: entry.key.to_string(),
                change: ButtonChange::ButtonAdded,
            });
        }
    }
    out
}

fn button_change(before: &Value, after: &Value) -> Option<ButtonChange> {
    if before == after {
        return None;
    }

    let old = ObservedAction::from_button(before);
    let new = ObservedAction::from_button(after);
    let describe = |a: &Option<ObservedAction>| {
        a.as_ref()
            .map_or_else(|| "none".to_string(), ObservedAction::describe)
    };

    match (&old, &new) {
        (Some(o), Some(n)) if o.kind().is_some() && o.kind() == n.kind() => {
            let (a, b) = (o.scene_ids(), n.scene_ids());
            if a.is_empty() && b.is_empty() {
                return Some(ButtonChange::Changed);
            }
            let added = set_difference(&b, &a);
            let removed = set_difference(&a, &b);
            if !added.is_empty() || !removed.is_empty() {
                Some(ButtonChange::Scenes { added, removed })
            } else if a != b {
                Some(ButtonChange::Reordered)
            } else {
                Some(ButtonChange::Changed)
            }
        }
        (None, None) => Some(ButtonChange::Changed),
        _ if old == new => Some(ButtonChange::Changed),
        _ => Some(ButtonChange::KindChanged {
            before: describe(&old),
            after: describe(&new),
        }),
    }
}

/// Items of `left` missing from `right`, in `left` order, without repeats.
fn set_difference(left: &[&str], right: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    left.iter()
        .copied()
        .filter(|id| !right.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// The configuration without its button entries.
fn outside_buttons(configuration: &Value) -> Value {
    let mut rest = configuration.clone();
    let keys: Vec<String> = button_entries(configuration, &ButtonLookup::default())
        .into_iter()
        .filter_map(|e| match e.key {
            SlotKey::Legacy(key) => Some(key),
            SlotKey::Addressed(_) => None,
        })
        .collect();
    if let Some(map) = rest.as_object_mut() {
        map.remove("buttons");
        for key in keys {
            map.remove(&key);
        }
    }
    rest
}

// ========================================================================
// Fields
// ========================================================================

fn field(record: &Value, pointer: &str) -> Value {
    record.pointer(pointer).cloned().unwrap_or(Value::Null)
}

fn push_if_different(changes: &mut Vec<FieldChange>, name: &str, before: Value, after: Value) {
    if before != after {
        changes.push(FieldChange::new(name, before, after));
    }
}

fn push_if_beyond(
    changes: &mut Vec<FieldChange>,
    name: &str,
    before: Value,
    after: Value,
    tolerance: f64,
) {
    let differs = match (before.as_f64(), after.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() > tolerance,
        _ => before != after,
    };
    if differs {
        changes.push(FieldChange::new(name, before, after));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BridgeCache, CacheDocument, StalenessPolicy};
    use crate::snapshot::fixtures;
    use serde_json::json;

    fn capture(document: CacheDocument) -> Snapshot {
        let cache = BridgeCache::from_document(document, StalenessPolicy::default());
        Snapshot::capture(&cache, "living").unwrap()
    }

    fn behaviour_buttons(diff: &StructuredDiff) -> &[ButtonDiff] {
        &diff.behaviours.changed[0].buttons
    }

    #[test]
    fn self_diff_is_empty() {
        let snapshot = capture(fixtures::document());
        let result = diff(
            &snapshot,
            &snapshot,
            DiffOptions::default().with_light_details(true),
        );
        assert!(result.is_empty(), "{result:?}");
    }

    #[test]
    fn scene_sets_not_generic_change() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        document.behaviours[0]["configuration"]["button1"] =
            fixtures::cycle_button(&["s-b", "s-c", "s-d"]);
        let current = capture(document);

        let result = diff(&saved, &current, DiffOptions::default());
        let change = &behaviour_buttons(&result)[0];
        assert_eq!(change.key, "button1");
        assert_eq!(
            change.change,
            ButtonChange::Scenes {
                added: vec!["s-d".into()],
                removed: vec!["s-a".into()],
            }
        );
        assert!(!result.behaviours.changed[0].configuration_changed);
    }

    #[test]
    fn order_only_is_reordered() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        document.behaviours[0]["configuration"]["button1"] =
            fixtures::cycle_button(&["s-c", "s-b", "s-a"]);
        let result = diff(&saved, &capture(document), DiffOptions::default());
        assert_eq!(behaviour_buttons(&result)[0].change, ButtonChange::Reordered);
    }

    #[test]
    fn kind_change_and_added_button() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        let config = &mut document.behaviours[0]["configuration"];
        config["button1"]["on_short_release"] = json!({"action": "dim_up"});
        config["button2"] = json!({"on_short_release": {"action": "dim_down"}});
        config["enabled_region"] = json!("eu");
        document.behaviours[0]["enabled"] = json!(false);

        let result = diff(&saved, &capture(document), DiffOptions::default());
        let change = &result.behaviours.changed[0];
        assert_eq!(
            change.buttons[0].change,
            ButtonChange::KindChanged {
                before: "scene cycle (3 scenes)".into(),
                after: "dim_up".into(),
            }
        );
        assert_eq!(change.buttons[1].key, "button2");
        assert_eq!(change.buttons[1].change, ButtonChange::ButtonAdded);
        assert!(change.configuration_changed);
        assert_eq!(change.changes[0].field, "enabled");
    }

    #[test]
    fn lights_and_scenes() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        document.lights[0]["dimming"]["brightness"] = json!(50.3);
        document.lights[0]["color_temperature"]["mirek"] = json!(250);
        document.scenes[0]["speed"] = json!(0.505);
        document.scenes[0]["auto_dynamic"] = json!(true);
        document.scenes.remove(1);
        let current = capture(document);

        let quiet = diff(&saved, &current, DiffOptions::default());
        assert!(quiet.lights.is_empty());

        let verbose = diff(&saved, &current, DiffOptions::default().with_light_details(true));
        let light = &verbose.lights.changed[0];
        assert_eq!(light.changes.len(), 1);
        assert_eq!(light.changes[0].field, "mirek");

        assert_eq!(verbose.scenes.removed[0].id, "s-b");
        let scene = &verbose.scenes.changed[0];
        assert_eq!(scene.changes.len(), 1);
        assert_eq!(scene.changes[0].field, "auto_dynamic");
    }

    #[test]
    fn deleted_room() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        document.rooms.remove(0);
        let cache = BridgeCache::from_document(document, StalenessPolicy::default());

        let result = saved.diff_against(&cache, DiffOptions::default());
        assert!(result.room.deleted);
        assert_eq!(result.behaviours.removed.len(), 1);
        assert_eq!(result.scenes.removed.len(), 2);
    }

    #[test]
    fn room_rename() {
        let saved = capture(fixtures::document());
        let mut document = fixtures::document();
        document.rooms[0]["metadata"]["name"] = json!("Lounge");
        let cache = BridgeCache::from_document(document, StalenessPolicy::default());

        let result = saved.diff_against(&cache, DiffOptions::default());
        assert_eq!(result.room.changes.len(), 1);
        assert_eq!(result.room.changes[0].to_string(), "name: \"Living room\" -> \"Lounge\"");
    }
}
