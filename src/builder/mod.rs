// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-format builders for button configurations.
//!
//! Each builder turns an already validated action into the typed fragment the
//! bridge stores under a button entry. Builders take resolved identifiers,
//! never names, and have no side effects. Fragments serialize
//! deterministically: identical logical input yields identical JSON.
//!
//! # Examples
//!
//! ```
//! use hue_switchboard::action::SceneCycle;
//! use hue_switchboard::builder::build_scene_cycle;
//! use serde_json::json;
//!
//! let cycle = SceneCycle::new(["s1", "s2"]).unwrap();
//! let fragment = build_scene_cycle(&cycle);
//!
//! assert_eq!(
//!     serde_json::to_value(&fragment).unwrap(),
//!     json!({"scene_cycle_extended": {
//!         "repeat_timeout": {"seconds": 3},
//!         "slots": [
//!             [{"action": {"recall": {"rid": "s1", "rtype": "scene"}}}],
//!             [{"action": {"recall": {"rid": "s2", "rtype": "scene"}}}]
//!         ],
//!         "with_off": {"enabled": false}
//!     }})
//! );
//! ```

mod instance;

pub use instance::{
    BUTTON_SCRIPT_ID, InitialSwitch, InstanceCreate, InstanceUpdate, build_initial_configuration,
};

use serde::Serialize;
use serde_json::Value;

use crate::action::{
    ButtonAction, ButtonProgram, DimDirection, Dimming, LongPressAction, SceneCycle, SystemAction,
    TimeSchedule,
};
use crate::error::ParseError;
use crate::types::ResourceRef;

/// Seconds after which a cycle restarts from its first scene.
pub const REPEAT_TIMEOUT_SECONDS: u32 = 3;

/// `{"seconds": n}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Seconds {
    /// Duration in seconds.
    pub seconds: u32,
}

/// `{"enabled": bool}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WithOff {
    /// Whether the cycle includes an "off" step.
    pub enabled: bool,
}

/// `{"action": {"recall": {"rid": ..., "rtype": "scene"}}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecallWrapper {
    action: RecallAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RecallAction {
    recall: ResourceRef,
}

impl RecallWrapper {
    /// Wraps a scene recall.
    #[must_use]
    pub fn scene(id: &str) -> Self {
        Self {
            action: RecallAction {
                recall: ResourceRef::scene(id),
            },
        }
    }
}

/// Body of `scene_cycle_extended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneCycleBody {
    repeat_timeout: Seconds,
    slots: Vec<[RecallWrapper; 1]>,
    with_off: WithOff,
}

/// `{"hour": h, "minute": m}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StartTime {
    hour: u8,
    minute: u8,
}

/// One entry of `time_based_extended.slots`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedSlot {
    start_time: StartTime,
    actions: Vec<RecallWrapper>,
}

/// Body of `time_based_extended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBasedBody {
    repeat_timeout: Seconds,
    slots: Vec<TimedSlot>,
    with_off: WithOff,
}

/// Body of `recall_single_extended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SingleRecallBody {
    actions: Vec<RecallWrapper>,
}

/// The value stored under `on_short_release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShortRelease {
    /// `{"scene_cycle_extended": {...}}`
    #[serde(rename = "scene_cycle_extended")]
    SceneCycle(SceneCycleBody),
    /// `{"time_based_extended": {...}}`
    #[serde(rename = "time_based_extended")]
    TimeBased(TimeBasedBody),
    /// `{"recall_single_extended": {...}}`
    #[serde(rename = "recall_single_extended")]
    SingleRecall(SingleRecallBody),
    /// `{"action": "dim_up" | "dim_down"}`
    #[serde(rename = "action")]
    Dimming(DimDirection),
}

/// The value stored under `on_long_press`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LongPress {
    /// `{"action": "all_off" | "home_off"}`
    #[serde(rename = "action")]
    System(SystemAction),
    /// `{"recall": {"rid": ..., "rtype": "scene"}}`
    #[serde(rename = "recall")]
    Scene(ResourceRef),
}

/// The value stored under `on_repeat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Repeat {
    action: DimDirection,
}

/// `{"group": {"rid": ..., "rtype": ...}}`, one entry of a `where` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhereEntry {
    /// The zone or room.
    pub group: ResourceRef,
}

/// The keys a program writes into a button entry.
///
/// Absent fields are not serialized, so merging the fragment into an existing
/// entry leaves unrelated keys alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ButtonFragment {
    /// Short-press action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_short_release: Option<ShortRelease>,
    /// Long-press action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_long_press: Option<LongPress>,
    /// Press-and-hold action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_repeat: Option<Repeat>,
    /// Scope override.
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<WhereEntry>>,
}

impl ButtonFragment {
    /// Serializes the fragment.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if serialization fails.
    pub fn to_value(&self) -> Result<Value, ParseError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Builds the `scene_cycle_extended` short-press fragment.
#[must_use]
pub fn build_scene_cycle(cycle: &SceneCycle) -> ShortRelease {
    ShortRelease::SceneCycle(SceneCycleBody {
        repeat_timeout: Seconds {
            seconds: REPEAT_TIMEOUT_SECONDS,
        },
        slots: cycle
            .scenes()
            .iter()
            .map(|id| [RecallWrapper::scene(id)])
            .collect(),
        with_off: WithOff { enabled: false },
    })
}

/// Builds the `time_based_extended` short-press fragment.
///
/// Slots are emitted in time order.
#[must_use]
pub fn build_time_based(schedule: &TimeSchedule) -> ShortRelease {
    let mut slots: Vec<_> = schedule.slots().to_vec();
    slots.sort_by_key(|slot| slot.time());

    ShortRelease::TimeBased(TimeBasedBody {
        repeat_timeout: Seconds {
            seconds: REPEAT_TIMEOUT_SECONDS,
        },
        slots: slots
            .iter()
            .map(|slot| TimedSlot {
                start_time: StartTime {
                    hour: slot.time().hour(),
                    minute: slot.time().minute(),
                },
                actions: vec![RecallWrapper::scene(slot.scene())],
            })
            .collect(),
        with_off: WithOff { enabled: true },
    })
}

/// Builds the `recall_single_extended` short-press fragment.
#[must_use]
pub fn build_single_recall(scene_id: &str) -> ShortRelease {
    ShortRelease::SingleRecall(SingleRecallBody {
        actions: vec![RecallWrapper::scene(scene_id)],
    })
}

/// Builds a dimming fragment: short press and repeat in the same direction,
/// plus the scope override when one is set.
#[must_use]
pub fn build_dimming(dimming: &Dimming) -> ButtonFragment {
    ButtonFragment {
        on_short_release: Some(ShortRelease::Dimming(dimming.direction())),
        on_long_press: None,
        on_repeat: Some(Repeat {
            action: dimming.direction(),
        }),
        scope: dimming.scope().map(|scope| {
            vec![WhereEntry {
                group: scope.clone(),
            }]
        }),
    }
}

/// Builds the `on_long_press` fragment.
#[must_use]
pub fn build_long_press(action: &LongPressAction) -> LongPress {
    match action {
        LongPressAction::System(system) => LongPress::System(*system),
        LongPressAction::Scene(id) => LongPress::Scene(ResourceRef::scene(id.as_str())),
    }
}

/// Builds the short-press part of a fragment for any action.
#[must_use]
pub fn build_action(action: &ButtonAction) -> ButtonFragment {
    match action {
        ButtonAction::SceneCycle(cycle) => ButtonFragment {
            on_short_release: Some(build_scene_cycle(cycle)),
            ..ButtonFragment::default()
        },
        ButtonAction::TimeBased(schedule) => ButtonFragment {
            on_short_release: Some(build_time_based(schedule)),
            ..ButtonFragment::default()
        },
        ButtonAction::SingleRecall(id) => ButtonFragment {
            on_short_release: Some(build_single_recall(id)),
            ..ButtonFragment::default()
        },
        ButtonAction::Dimming(dimming) => build_dimming(dimming),
    }
}

/// Builds the complete fragment for a button program.
#[must_use]
pub fn build_program(program: &ButtonProgram) -> ButtonFragment {
    let mut fragment = program
        .short_press()
        .map(build_action)
        .unwrap_or_default();
    fragment.on_long_press = program.long_press().map(build_long_press);
    fragment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ObservedAction, TimeSlot};
    use serde_json::json;

    fn value<T: Serialize>(t: &T) -> Value {
        serde_json::to_value(t).unwrap()
    }

    #[test]
    fn scene_cycle_round_trips_in_order() {
        let ids = ["c", "a", "b", "a"];
        let fragment = build_scene_cycle(&SceneCycle::new(ids).unwrap());
        let observed = ObservedAction::from_short_release(&value(&fragment));
        assert_eq!(observed.scene_ids(), ids);
    }

    #[test]
    fn time_based_sorted_and_stable() {
        let a = TimeSchedule::new(vec![
            TimeSlot::at(20, 0, "evening").unwrap(),
            TimeSlot::at(7, 0, "morning").unwrap(),
        ])
        .unwrap();
        let b = TimeSchedule::new(vec![
            TimeSlot::at(7, 0, "morning").unwrap(),
            TimeSlot::at(20, 0, "evening").unwrap(),
        ])
        .unwrap();

        let json_a = serde_json::to_string(&build_time_based(&a)).unwrap();
        let json_b = serde_json::to_string(&build_time_based(&b)).unwrap();
        assert_eq!(json_a, json_b);

        let wire = value(&build_time_based(&a));
        assert_eq!(
            wire["time_based_extended"]["slots"][0],
            json!({
                "start_time": {"hour": 7, "minute": 0},
                "actions": [{"action": {"recall": {"rid": "morning", "rtype": "scene"}}}]
            })
        );
        assert_eq!(wire["time_based_extended"]["with_off"]["enabled"], true);

        let ObservedAction::TimeBased(back) = ObservedAction::from_short_release(&wire) else {
            panic!("expected time-based");
        };
        let expected: Vec<_> = a
            .slots()
            .iter()
            .map(|s| (s.time(), s.scene().to_string()))
            .collect();
        assert_eq!(back, expected);
    }

    #[test]
    fn single_recall_shape() {
        assert_eq!(
            value(&build_single_recall("s")),
            json!({"recall_single_extended": {
                "actions": [{"action": {"recall": {"rid": "s", "rtype": "scene"}}}]
            }})
        );
    }

    #[test]
    fn dimming_with_and_without_scope() {
        let plain = build_dimming(&Dimming::new(DimDirection::Up));
        assert_eq!(
            plain.to_value().unwrap(),
            json!({
                "on_short_release": {"action": "dim_up"},
                "on_repeat": {"action": "dim_up"}
            })
        );

        let scoped = Dimming::new(DimDirection::Down)
            .with_scope(ResourceRef::new("z1", "zone"))
            .unwrap();
        assert_eq!(
            build_dimming(&scoped).to_value().unwrap()["where"],
            json!([{"group": {"rid": "z1", "rtype": "zone"}}])
        );
    }

    #[test]
    fn long_press_shapes() {
        assert_eq!(
            value(&build_long_press(&LongPressAction::System(SystemAction::AllOff))),
            json!({"action": "all_off"})
        );
        assert_eq!(
            value(&build_long_press(&LongPressAction::Scene("n".into()))),
            json!({"recall": {"rid": "n", "rtype": "scene"}})
        );
    }

    #[test]
    fn program_combines_short_and_long() {
        let program = ButtonProgram::new(
            Some(ButtonAction::single_recall("s").unwrap()),
            Some(LongPressAction::System(SystemAction::HomeOff)),
        )
        .unwrap();
        let wire = build_program(&program).to_value().unwrap();
        assert!(wire.get("on_short_release").is_some());
        assert_eq!(wire["on_long_press"], json!({"action": "home_off"}));
        assert!(wire.get("on_repeat").is_none());
        assert!(wire.get("where").is_none());
    }
}
