// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User-facing program requests.
//!
//! A [`ProgramRequest`] collects the raw choices a user makes for one button,
//! using human names rather than identifiers. [`ProgramRequest::validate`]
//! checks that the choices are consistent and returns a [`ProgramIntent`],
//! which still carries names; turning names into identifiers is the job of
//! [`crate::resolve`].
//!
//! # Examples
//!
//! ```
//! use hue_switchboard::action::{ProgramRequest, ShortPressIntent};
//! use hue_switchboard::types::ControlPosition;
//!
//! let intent = ProgramRequest::new()
//!     .with_scene_list("Read, Relax")
//!     .with_long_press("all off")
//!     .validate(ControlPosition::new(1).unwrap())
//!     .unwrap();
//!
//! assert_eq!(
//!     intent.short_press,
//!     Some(ShortPressIntent::SceneCycle(vec!["Read".into(), "Relax".into()]))
//! );
//! ```

use super::{DimDirection, SystemAction};
use crate::error::ValueError;
use crate::types::{ControlPosition, TimeOfDay};

/// Raw choices for programming one button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramRequest {
    scenes: Option<Vec<String>>,
    time_based: bool,
    slots: Vec<String>,
    scene: Option<String>,
    dim_up: bool,
    dim_down: bool,
    scope: Option<String>,
    long_press: Option<String>,
}

impl ProgramRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cycles through the given scene names.
    #[must_use]
    pub fn with_scenes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Cycles through a comma-separated list of scene names.
    #[must_use]
    pub fn with_scene_list(self, list: &str) -> Self {
        self.with_scenes(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        )
    }

    /// Switches to time-based mode.
    #[must_use]
    pub fn time_based(mut self) -> Self {
        self.time_based = true;
        self
    }

    /// Adds a `HH:MM=SceneName` slot.
    #[must_use]
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slots.push(slot.into());
        self
    }

    /// Recalls a single scene.
    #[must_use]
    pub fn with_scene(mut self, name: impl Into<String>) -> Self {
        self.scene = Some(name.into());
        self
    }

    /// Dims up on press and hold.
    #[must_use]
    pub fn dim_up(mut self) -> Self {
        self.dim_up = true;
        self
    }

    /// Dims down on press and hold.
    #[must_use]
    pub fn dim_down(mut self) -> Self {
        self.dim_down = true;
        self
    }

    /// Restricts dimming to a zone or room, by name.
    #[must_use]
    pub fn with_scope(mut self, name: impl Into<String>) -> Self {
        self.scope = Some(name.into());
        self
    }

    /// Sets the long-press action: a system action name or a scene name.
    #[must_use]
    pub fn with_long_press(mut self, action: impl Into<String>) -> Self {
        self.long_press = Some(action.into());
        self
    }

    /// Checks the request for conflicts and missing choices.
    ///
    /// Buttons 2 and 3 fall back to dimming up and down when no action is
    /// given at all.
    ///
    /// # Errors
    ///
    /// - `ValueError::Conflict` for slots without time-based mode, both dim
    ///   directions, several short-press choices, or a scope without dimming
    /// - `ValueError::MissingAction` for time-based mode without slots or an
    ///   empty request on a button without a default
    /// - `ValueError::SceneCycleTooShort` for a scene list of fewer than two
    /// - `ValueError::InvalidTimeSlot` / `ValueError::OutOfRange` for a bad slot
    pub fn validate(&self, position: ControlPosition) -> Result<ProgramIntent, ValueError> {
        if !self.slots.is_empty() && !self.time_based {
            return Err(ValueError::Conflict(
                "time slots require time-based mode".to_string(),
            ));
        }
        if self.time_based && self.slots.is_empty() {
            return Err(ValueError::MissingAction(
                "time-based mode requires at least one HH:MM=SceneName slot".to_string(),
            ));
        }
        if self.dim_up && self.dim_down {
            return Err(ValueError::Conflict(
                "cannot dim up and dim down at the same time".to_string(),
            ));
        }

        let choices = [
            self.scenes.is_some(),
            self.time_based,
            self.scene.is_some(),
            self.dim_up,
            self.dim_down,
        ]
        .into_iter()
        .filter(|&chosen| chosen)
        .count();

        if choices > 1 {
            return Err(ValueError::Conflict(
                "choose only one short-press action".to_string(),
            ));
        }
        if self.scope.is_some() && !(self.dim_up || self.dim_down || choices == 0) {
            return Err(ValueError::Conflict(
                "a scope only applies to dimming".to_string(),
            ));
        }

        let long_press = self.long_press.as_deref().map(LongPressIntent::parse);

        let short_press = if let Some(names) = &self.scenes {
            if names.len() < 2 {
                return Err(ValueError::SceneCycleTooShort(names.len()));
            }
            Some(ShortPressIntent::SceneCycle(names.clone()))
        } else if self.time_based {
            let slots = self
                .slots
                .iter()
                .map(|s| parse_time_slot(s))
                .collect::<Result<Vec<_>, _>>()?;
            Some(ShortPressIntent::TimeBased(slots))
        } else if let Some(name) = &self.scene {
            Some(ShortPressIntent::SingleScene(name.trim().to_string()))
        } else if self.dim_up || self.dim_down {
            Some(ShortPressIntent::Dimming {
                direction: DimDirection::from_flags(self.dim_up, self.dim_down)?,
                scope: self.scope.clone(),
            })
        } else if long_press.is_none() {
            let direction = match position.value() {
                2 => DimDirection::Up,
                3 => DimDirection::Down,
                _ => {
                    return Err(ValueError::MissingAction(
                        "specify a scene list, time-based slots, a scene, a dim direction or a long press"
                            .to_string(),
                    ));
                }
            };
            Some(ShortPressIntent::Dimming {
                direction,
                scope: self.scope.clone(),
            })
        } else {
            None
        };

        Ok(ProgramIntent {
            short_press,
            long_press,
        })
    }
}

/// A validated short-press choice, still expressed with names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortPressIntent {
    /// Scene names to cycle through.
    SceneCycle(Vec<String>),
    /// Time slots with scene names.
    TimeBased(Vec<(TimeOfDay, String)>),
    /// A single scene name.
    SingleScene(String),
    /// Dimming with an optional zone or room name.
    Dimming {
        /// Direction.
        direction: DimDirection,
        /// Zone or room name.
        scope: Option<String>,
    },
}

/// A validated long-press choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LongPressIntent {
    /// A system action.
    System(SystemAction),
    /// A scene name.
    Scene(String),
}

impl LongPressIntent {
    /// Interprets a long-press value. Recognised system action names win;
    /// everything else is a scene name.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value
            .parse::<SystemAction>()
            .map_or_else(|_| Self::Scene(value.trim().to_string()), Self::System)
    }
}

/// A validated request for one button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramIntent {
    /// Short-press choice.
    pub short_press: Option<ShortPressIntent>,
    /// Long-press choice.
    pub long_press: Option<LongPressIntent>,
}

/// Parses a `HH:MM=SceneName` slot. The scene name is trimmed.
///
/// # Errors
///
/// Returns `ValueError::InvalidTimeSlot` for a malformed slot and
/// `ValueError::OutOfRange` for an hour above 23 or a minute above 59.
pub fn parse_time_slot(input: &str) -> Result<(TimeOfDay, String), ValueError> {
    let invalid = |reason: &str| ValueError::InvalidTimeSlot {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let (time, scene) = input
        .split_once('=')
        .ok_or_else(|| invalid("expected HH:MM=SceneName"))?;
    let (hour, minute) = time
        .split_once(':')
        .ok_or_else(|| invalid("expected HH:MM before '='"))?;
    let hour: i64 = hour
        .trim()
        .parse()
        .map_err(|_| invalid("hour and minute must be integers"))?;
    let minute: i64 = minute
        .trim()
        .parse()
        .map_err(|_| invalid("hour and minute must be integers"))?;
    let time = TimeOfDay::from_i64(hour, minute)?;

    let scene = scene.trim();
    if scene.is_empty() {
        return Err(invalid("missing scene name"));
    }
    Ok((time, scene.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(n: u16) -> ControlPosition {
        ControlPosition::new(n).unwrap()
    }

    #[test]
    fn slot_requires_time_based() {
        let err = ProgramRequest::new()
            .with_slot("07:00=Morning")
            .validate(pos(1))
            .unwrap_err();
        assert!(matches!(err, ValueError::Conflict(_)));

        let err = ProgramRequest::new().time_based().validate(pos(1)).unwrap_err();
        assert!(matches!(err, ValueError::MissingAction(_)));
    }

    #[test]
    fn both_dim_directions_conflict() {
        let err = ProgramRequest::new()
            .dim_up()
            .dim_down()
            .validate(pos(2))
            .unwrap_err();
        assert!(matches!(err, ValueError::Conflict(_)));
    }

    #[test]
    fn several_short_press_choices_conflict() {
        let err = ProgramRequest::new()
            .with_scene("Relax")
            .dim_up()
            .validate(pos(1))
            .unwrap_err();
        assert!(matches!(err, ValueError::Conflict(_)));
    }

    #[test]
    fn single_scene_list_rejected() {
        let err = ProgramRequest::new()
            .with_scene_list("Relax")
            .validate(pos(1))
            .unwrap_err();
        assert_eq!(err, ValueError::SceneCycleTooShort(1));
    }

    #[test]
    fn empty_request_defaults_for_dim_buttons() {
        let intent = ProgramRequest::new().validate(pos(2)).unwrap();
        assert_eq!(
            intent.short_press,
            Some(ShortPressIntent::Dimming {
                direction: DimDirection::Up,
                scope: None
            })
        );
        let intent = ProgramRequest::new().validate(pos(3)).unwrap();
        assert!(matches!(
            intent.short_press,
            Some(ShortPressIntent::Dimming {
                direction: DimDirection::Down,
                ..
            })
        ));
        assert!(matches!(
            ProgramRequest::new().validate(pos(1)),
            Err(ValueError::MissingAction(_))
        ));
    }

    #[test]
    fn long_press_alone_is_enough() {
        let intent = ProgramRequest::new()
            .with_long_press("Nightlight")
            .validate(pos(4))
            .unwrap();
        assert_eq!(intent.short_press, None);
        assert_eq!(
            intent.long_press,
            Some(LongPressIntent::Scene("Nightlight".to_string()))
        );
    }

    #[test]
    fn long_press_system_actions() {
        assert_eq!(
            LongPressIntent::parse("Home Off"),
            LongPressIntent::System(SystemAction::HomeOff)
        );
        assert_eq!(
            LongPressIntent::parse("all_off"),
            LongPressIntent::System(SystemAction::AllOff)
        );
    }

    #[test]
    fn scope_needs_dimming() {
        let err = ProgramRequest::new()
            .with_scene("Relax")
            .with_scope("Kitchen")
            .validate(pos(1))
            .unwrap_err();
        assert!(matches!(err, ValueError::Conflict(_)));

        let intent = ProgramRequest::new()
            .dim_down()
            .with_scope("Kitchen")
            .validate(pos(3))
            .unwrap();
        assert_eq!(
            intent.short_press,
            Some(ShortPressIntent::Dimming {
                direction: DimDirection::Down,
                scope: Some("Kitchen".to_string())
            })
        );
    }

    #[test]
    fn time_slots_parsed() {
        let intent = ProgramRequest::new()
            .time_based()
            .with_slot("20:00=Evening")
            .with_slot("7:00= Morning ")
            .validate(pos(1))
            .unwrap();
        let Some(ShortPressIntent::TimeBased(slots)) = intent.short_press else {
            panic!("expected time-based intent");
        };
        assert_eq!(slots[1].1, "Morning");
    }

    #[test]
    fn slot_parse_errors() {
        assert!(matches!(
            parse_time_slot("07:00 Morning"),
            Err(ValueError::InvalidTimeSlot { .. })
        ));
        assert!(matches!(
            parse_time_slot("0700=Morning"),
            Err(ValueError::InvalidTimeSlot { .. })
        ));
        assert!(matches!(
            parse_time_slot("aa:00=Morning"),
            Err(ValueError::InvalidTimeSlot { .. })
        ));
        assert!(matches!(
            parse_time_slot("24:00=Morning"),
            Err(ValueError::OutOfRange { field: "hour", .. })
        ));
        assert!(matches!(
            parse_time_slot("23:60=Morning"),
            Err(ValueError::OutOfRange { field: "minute", .. })
        ));
        assert!(matches!(
            parse_time_slot("23:00= "),
            Err(ValueError::InvalidTimeSlot { .. })
        ));
    }
}
