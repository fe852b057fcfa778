// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Long-press actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A bridge-defined action that needs no scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemAction {
    /// Turn off every light on the bridge.
    AllOff,
    /// Turn off every light in the home.
    HomeOff,
}

impl SystemAction {
    /// Returns the bridge action name.
    #[must_use]
    pub const fn as_action(self) -> &'static str {
        match self {
            Self::AllOff => "all_off",
            Self::HomeOff => "home_off",
        }
    }
}

impl fmt::Display for SystemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_action())
    }
}

impl FromStr for SystemAction {
    type Err = ValueError;

    /// Accepts `all off`, `All_Off`, `home off` and similar spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "all_off" => Ok(Self::AllOff),
            "home_off" => Ok(Self::HomeOff),
            _ => Err(ValueError::UnknownSystemAction(s.to_string())),
        }
    }
}

/// What a long press does. A system action and a scene recall are mutually
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LongPressAction {
    /// Run a system action.
    System(SystemAction),
    /// Recall a scene by identifier.
    Scene(String),
}

impl LongPressAction {
    /// Creates a scene recall.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank identifier.
    pub fn scene(id: impl Into<String>) -> Result<Self, ValueError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scene"));
        }
        Ok(Self::Scene(id))
    }

    /// Returns the recalled scene, if any.
    #[must_use]
    pub fn scene_id(&self) -> Option<&str> {
        match self {
            Self::Scene(id) => Some(id),
            Self::System(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_action_spellings() {
        for input in ["all off", "ALL_OFF", " all_off "] {
            assert_eq!(input.parse::<SystemAction>(), Ok(SystemAction::AllOff));
        }
        assert_eq!("Home Off".parse::<SystemAction>(), Ok(SystemAction::HomeOff));
        assert!("Relax".parse::<SystemAction>().is_err());
    }

    #[test]
    fn scene_long_press() {
        assert_eq!(
            LongPressAction::scene("s1").unwrap().scene_id(),
            Some("s1")
        );
        assert!(LongPressAction::scene("").is_err());
        assert_eq!(LongPressAction::System(SystemAction::AllOff).scene_id(), None);
    }
}
