// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reverse extraction of short-press actions from stored configurations.
//!
//! Documents read back from the bridge are not guaranteed to satisfy the
//! constructors in [`crate::action`]: a freshly initialised switch carries a
//! scene cycle with no slots, and other tools may write a single-entry cycle.
//! [`ObservedAction`] therefore describes what is there without validating it.

use serde_json::Value;

use super::{ActionKind, DimDirection};
use crate::types::TimeOfDay;

/// A short-press action as found in a stored button entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedAction {
    /// `scene_cycle_extended`, scene identifiers in cycle order.
    SceneCycle(Vec<String>),
    /// `time_based_extended`, slots in stored order.
    TimeBased(Vec<(TimeOfDay, String)>),
    /// `recall_single_extended`.
    SingleRecall(Vec<String>),
    /// A plain dimming action.
    Dimming(DimDirection),
    /// Any other short-press document, identified by its first key.
    Other(String),
}

impl ObservedAction {
    /// Reads the `on_short_release` entry of a button document.
    ///
    /// Returns `None` if the button has no short-press action.
    #[must_use]
    pub fn from_button(button: &Value) -> Option<Self> {
        button.get("on_short_release").map(Self::from_short_release)
    }

    /// Reads an `on_short_release` value.
    #[must_use]
    pub fn from_short_release(value: &Value) -> Self {
        if let Some(cycle) = value.get("scene_cycle_extended") {
            let scenes = slots(cycle)
                .iter()
                .filter_map(|slot| slot.as_array()?.first().and_then(recall_rid))
                .collect();
            return Self::SceneCycle(scenes);
        }

        if let Some(timed) = value.get("time_based_extended") {
            let entries = slots(timed)
                .iter()
                .filter_map(|slot| {
                    let start = slot.get("start_time")?;
                    let time = TimeOfDay::from_i64(
                        start.get("hour").and_then(Value::as_i64).unwrap_or(0),
                        start.get("minute").and_then(Value::as_i64).unwrap_or(0),
                    )
                    .ok()?;
                    let scene = slot
                        .get("actions")?
                        .as_array()?
                        .first()
                        .and_then(recall_rid)?;
                    Some((time, scene))
                })
                .collect();
            return Self::TimeBased(entries);
        }

        if let Some(single) = value.get("recall_single_extended") {
            let scenes = single
                .get("actions")
                .and_then(Value::as_array)
                .map(|actions| actions.iter().filter_map(recall_rid).collect())
                .unwrap_or_default();
            return Self::SingleRecall(scenes);
        }

        if let Some(direction) = value
            .get("action")
            .and_then(Value::as_str)
            .and_then(DimDirection::from_action)
        {
            return Self::Dimming(direction);
        }

        let key = value
            .as_object()
            .and_then(|map| map.keys().next().cloned())
            .unwrap_or_default();
        Self::Other(key)
    }

    /// Returns the action kind, or `None` for unrecognised documents.
    #[must_use]
    pub const fn kind(&self) -> Option<ActionKind> {
        match self {
            Self::SceneCycle(_) => Some(ActionKind::SceneCycle),
            Self::TimeBased(_) => Some(ActionKind::TimeBased),
            Self::SingleRecall(_) => Some(ActionKind::SingleRecall),
            Self::Dimming(_) => Some(ActionKind::Dimming),
            Self::Other(_) => None,
        }
    }

    /// Returns every recalled scene identifier in stored order.
    #[must_use]
    pub fn scene_ids(&self) -> Vec<&str> {
        match self {
            Self::SceneCycle(ids) | Self::SingleRecall(ids) => {
                ids.iter().map(String::as_str).collect()
            }
            Self::TimeBased(slots) => slots.iter().map(|(_, id)| id.as_str()).collect(),
            Self::Dimming(_) | Self::Other(_) => Vec::new(),
        }
    }

    /// Short description used in reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::SceneCycle(ids) => format!("scene cycle ({} scenes)", ids.len()),
            Self::TimeBased(slots) => format!("time-based ({} slots)", slots.len()),
            Self::SingleRecall(_) => "single scene".to_string(),
            Self::Dimming(d) => d.as_action().to_string(),
            Self::Other(key) if key.is_empty() => "empty".to_string(),
            Self::Other(key) => key.clone(),
        }
    }
}

fn slots(value: &Value) -> &[Value] {
    value
        .get("slots")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Extracts `action.recall.rid` from an action wrapper.
fn recall_rid(wrapper: &Value) -> Option<String> {
    wrapper
        .get("action")?
        .get("recall")?
        .get("rid")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recall(id: &str) -> Value {
        json!({"action": {"recall": {"rid": id, "rtype": "scene"}}})
    }

    #[test]
    fn reads_scene_cycle() {
        let button = json!({
            "on_short_release": {
                "scene_cycle_extended": {
                    "slots": [[recall("a")], [recall("b")]],
                    "with_off": {"enabled": false}
                }
            }
        });
        let observed = ObservedAction::from_button(&button).unwrap();
        assert_eq!(observed.kind(), Some(ActionKind::SceneCycle));
        assert_eq!(observed.scene_ids(), vec!["a", "b"]);
    }

    #[test]
    fn empty_cycle_is_still_a_cycle() {
        let value = json!({"scene_cycle_extended": {"slots": []}});
        assert_eq!(
            ObservedAction::from_short_release(&value),
            ObservedAction::SceneCycle(vec![])
        );
    }

    #[test]
    fn reads_time_based() {
        let value = json!({
            "time_based_extended": {
                "slots": [
                    {"start_time": {"hour": 7, "minute": 0}, "actions": [recall("m")]},
                    {"start_time": {"hour": 20, "minute": 30}, "actions": [recall("e")]}
                ]
            }
        });
        let ObservedAction::TimeBased(slots) = ObservedAction::from_short_release(&value) else {
            panic!("expected time-based");
        };
        assert_eq!(slots[1].0.to_string(), "20:30");
        assert_eq!(slots[1].1, "e");
    }

    #[test]
    fn reads_single_and_dimming() {
        let single = json!({"recall_single_extended": {"actions": [recall("x")]}});
        assert_eq!(
            ObservedAction::from_short_release(&single).scene_ids(),
            vec!["x"]
        );

        let dim = json!({"action": "dim_down"});
        assert_eq!(
            ObservedAction::from_short_release(&dim),
            ObservedAction::Dimming(DimDirection::Down)
        );
    }

    #[test]
    fn unknown_shape() {
        let observed = ObservedAction::from_short_release(&json!({"scene_cycle": {}}));
        assert_eq!(observed, ObservedAction::Other("scene_cycle".to_string()));
        assert_eq!(observed.kind(), None);
        assert!(ObservedAction::from_button(&json!({"where": []})).is_none());
    }
}
