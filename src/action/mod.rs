// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Button action variants.
//!
//! A switch button carries at most one short-press [`ButtonAction`], one
//! [`LongPressAction`], and, for dimming buttons, a repeat action that follows
//! the dimming direction. Every constructor validates its input, so a value
//! of these types is always structurally sound and can be handed to the
//! [builders](crate::builder) without further checks.
//!
//! | Variant | Short press does | Wire key |
//! |---------|------------------|----------|
//! | [`ButtonAction::SceneCycle`] | advance through 2+ scenes | `scene_cycle_extended` |
//! | [`ButtonAction::TimeBased`] | recall the scene for the current time | `time_based_extended` |
//! | [`ButtonAction::SingleRecall`] | recall one scene | `recall_single_extended` |
//! | [`ButtonAction::Dimming`] | dim up or down | `action` |
//!
//! # Examples
//!
//! ```
//! use hue_switchboard::action::{ButtonAction, ButtonProgram, LongPressAction, SystemAction};
//!
//! let program = ButtonProgram::new(
//!     Some(ButtonAction::scene_cycle(["read-id", "relax-id"]).unwrap()),
//!     Some(LongPressAction::System(SystemAction::AllOff)),
//! )
//! .unwrap();
//!
//! assert!(program.repeat_direction().is_none());
//! ```

mod long_press;
mod observed;
mod request;
mod schedule;

pub use long_press::{LongPressAction, SystemAction};
pub use observed::ObservedAction;
pub use request::{LongPressIntent, ProgramIntent, ProgramRequest, ShortPressIntent, parse_time_slot};
pub use schedule::{TimeSchedule, TimeSlot};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::types::ResourceRef;

/// The kind of a short-press action.
///
/// The bridge cannot change a button's action kind through a partial update,
/// so the kind decides how a mutation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Cycle through scenes.
    SceneCycle,
    /// Time-of-day schedule.
    TimeBased,
    /// Single scene recall.
    SingleRecall,
    /// Directional dimming.
    Dimming,
}

impl ActionKind {
    /// Returns the key this kind is stored under in `on_short_release`.
    #[must_use]
    pub const fn wire_key(self) -> &'static str {
        match self {
            Self::SceneCycle => "scene_cycle_extended",
            Self::TimeBased => "time_based_extended",
            Self::SingleRecall => "recall_single_extended",
            Self::Dimming => "action",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SceneCycle => "scene cycle",
            Self::TimeBased => "time-based schedule",
            Self::SingleRecall => "single scene",
            Self::Dimming => "dimming",
        })
    }
}

/// Dimming direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimDirection {
    /// Brighten.
    #[serde(rename = "dim_up")]
    Up,
    /// Darken.
    #[serde(rename = "dim_down")]
    Down,
}

impl DimDirection {
    /// Returns the bridge action name (`dim_up` / `dim_down`).
    #[must_use]
    pub const fn as_action(self) -> &'static str {
        match self {
            Self::Up => "dim_up",
            Self::Down => "dim_down",
        }
    }

    /// Parses a bridge action name.
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "dim_up" => Some(Self::Up),
            "dim_down" => Some(Self::Down),
            _ => None,
        }
    }

    /// Chooses a direction from a pair of flags.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::Conflict` when both flags are set and
    /// `ValueError::MissingAction` when neither is.
    pub fn from_flags(up: bool, down: bool) -> Result<Self, ValueError> {
        match (up, down) {
            (true, true) => Err(ValueError::Conflict(
                "cannot dim up and dim down at the same time".to_string(),
            )),
            (true, false) => Ok(Self::Up),
            (false, true) => Ok(Self::Down),
            (false, false) => Err(ValueError::MissingAction(
                "no dimming direction given".to_string(),
            )),
        }
    }
}

/// An ordered cycle of at least two scenes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneCycle {
    scenes: Vec<String>,
}

impl SceneCycle {
    /// Creates a scene cycle.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::SceneCycleTooShort` for fewer than two scenes and
    /// `ValueError::EmptyIdentifier` if any identifier is blank.
    pub fn new<I, S>(scenes: I) -> Result<Self, ValueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scenes: Vec<String> = scenes.into_iter().map(Into::into).collect();
        if scenes.len() < 2 {
            return Err(ValueError::SceneCycleTooShort(scenes.len()));
        }
        if scenes.iter().any(|s| s.trim().is_empty()) {
            return Err(ValueError::EmptyIdentifier("scene"));
        }
        Ok(Self { scenes })
    }

    /// Returns the scene identifiers in cycle order.
    #[must_use]
    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }
}

/// Continuous dimming in one direction, optionally scoped to a zone or room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dimming {
    direction: DimDirection,
    scope: Option<ResourceRef>,
}

impl Dimming {
    /// Creates a dimming action that affects whatever the switch controls.
    #[must_use]
    pub fn new(direction: DimDirection) -> Self {
        Self {
            direction,
            scope: None,
        }
    }

    /// Restricts dimming to a zone or room.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank identifier.
    pub fn with_scope(mut self, scope: ResourceRef) -> Result<Self, ValueError> {
        if scope.rid.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scope"));
        }
        self.scope = Some(scope);
        Ok(self)
    }

    /// Returns the direction.
    #[must_use]
    pub const fn direction(&self) -> DimDirection {
        self.direction
    }

    /// Returns the scope override, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&ResourceRef> {
        self.scope.as_ref()
    }
}

/// A short-press action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ButtonAction {
    /// Cycle through scenes on each press.
    SceneCycle(SceneCycle),
    /// Recall the scene scheduled for the current time of day.
    TimeBased(TimeSchedule),
    /// Recall exactly one scene.
    SingleRecall(String),
    /// Dim the controlled lights.
    Dimming(Dimming),
}

impl ButtonAction {
    /// Shorthand for [`SceneCycle::new`].
    ///
    /// # Errors
    ///
    /// See [`SceneCycle::new`].
    pub fn scene_cycle<I, S>(scenes: I) -> Result<Self, ValueError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SceneCycle::new(scenes).map(Self::SceneCycle)
    }

    /// Creates a single-scene recall.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank identifier.
    pub fn single_recall(scene: impl Into<String>) -> Result<Self, ValueError> {
        let scene = scene.into();
        if scene.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scene"));
        }
        Ok(Self::SingleRecall(scene))
    }

    /// Creates an unscoped dimming action.
    #[must_use]
    pub fn dimming(direction: DimDirection) -> Self {
        Self::Dimming(Dimming::new(direction))
    }

    /// Returns the kind of this action.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::SceneCycle(_) => ActionKind::SceneCycle,
            Self::TimeBased(_) => ActionKind::TimeBased,
            Self::SingleRecall(_) => ActionKind::SingleRecall,
            Self::Dimming(_) => ActionKind::Dimming,
        }
    }

    /// Returns every scene identifier the action recalls, in wire order.
    #[must_use]
    pub fn scene_ids(&self) -> Vec<&str> {
        match self {
            Self::SceneCycle(cycle) => cycle.scenes().iter().map(String::as_str).collect(),
            Self::TimeBased(schedule) => schedule.slots().iter().map(TimeSlot::scene).collect(),
            Self::SingleRecall(scene) => vec![scene.as_str()],
            Self::Dimming(_) => Vec::new(),
        }
    }
}

/// Everything a single button should do.
///
/// At least one of the short-press and long-press actions is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ButtonProgram {
    short_press: Option<ButtonAction>,
    long_press: Option<LongPressAction>,
}

impl ButtonProgram {
    /// Creates a program.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::MissingAction` if both actions are absent.
    pub fn new(
        short_press: Option<ButtonAction>,
        long_press: Option<LongPressAction>,
    ) -> Result<Self, ValueError> {
        if short_press.is_none() && long_press.is_none() {
            return Err(ValueError::MissingAction(
                "a button program needs a short-press or long-press action".to_string(),
            ));
        }
        Ok(Self {
            short_press,
            long_press,
        })
    }

    /// A program with only a short-press action.
    #[must_use]
    pub fn short(action: ButtonAction) -> Self {
        Self {
            short_press: Some(action),
            long_press: None,
        }
    }

    /// Returns the short-press action.
    #[must_use]
    pub fn short_press(&self) -> Option<&ButtonAction> {
        self.short_press.as_ref()
    }

    /// Returns the long-press action.
    #[must_use]
    pub fn long_press(&self) -> Option<&LongPressAction> {
        self.long_press.as_ref()
    }

    /// Returns the kind of the short-press action.
    #[must_use]
    pub fn kind(&self) -> Option<ActionKind> {
        self.short_press.as_ref().map(ButtonAction::kind)
    }

    /// Direction of the repeat action, present only for dimming buttons.
    #[must_use]
    pub fn repeat_direction(&self) -> Option<DimDirection> {
        match &self.short_press {
            Some(ButtonAction::Dimming(d)) => Some(d.direction()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_cycle_needs_two_scenes() {
        assert_eq!(
            SceneCycle::new(Vec::<String>::new()),
            Err(ValueError::SceneCycleTooShort(0))
        );
        assert_eq!(
            SceneCycle::new(["only"]),
            Err(ValueError::SceneCycleTooShort(1))
        );
        let cycle = SceneCycle::new(["a", "b", "c"]).unwrap();
        assert_eq!(cycle.scenes(), ["a", "b", "c"]);
    }

    #[test]
    fn scene_cycle_rejects_blank_ids() {
        assert_eq!(
            SceneCycle::new(["a", " "]),
            Err(ValueError::EmptyIdentifier("scene"))
        );
    }

    #[test]
    fn dim_flags_conflict() {
        assert!(matches!(
            DimDirection::from_flags(true, true),
            Err(ValueError::Conflict(_))
        ));
        assert_eq!(DimDirection::from_flags(false, true), Ok(DimDirection::Down));
    }

    #[test]
    fn program_needs_an_action() {
        assert!(ButtonProgram::new(None, None).is_err());
        let program = ButtonProgram::new(
            None,
            Some(LongPressAction::System(SystemAction::HomeOff)),
        )
        .unwrap();
        assert_eq!(program.kind(), None);
    }

    #[test]
    fn repeat_follows_dimming() {
        let program = ButtonProgram::short(ButtonAction::dimming(DimDirection::Up));
        assert_eq!(program.repeat_direction(), Some(DimDirection::Up));

        let program = ButtonProgram::short(ButtonAction::single_recall("s").unwrap());
        assert_eq!(program.repeat_direction(), None);
    }

    #[test]
    fn scoped_dimming() {
        let dim = Dimming::new(DimDirection::Down)
            .with_scope(ResourceRef::new("zone-1", "zone"))
            .unwrap();
        assert_eq!(dim.scope().map(|s| s.rid.as_str()), Some("zone-1"));
        assert!(
            Dimming::new(DimDirection::Down)
                .with_scope(ResourceRef::new("", "zone"))
                .is_err()
        );
    }

    #[test]
    fn kinds_and_wire_keys() {
        let action = ButtonAction::single_recall("x").unwrap();
        assert_eq!(action.kind(), ActionKind::SingleRecall);
        assert_eq!(action.kind().wire_key(), "recall_single_extended");
        assert_eq!(action.scene_ids(), vec!["x"]);
    }
}
