// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control position of a switch button.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The physical or functional index of a button on a switch.
///
/// Regular buttons are numbered 1 to 4. Tap dials expose their rotary ring as
/// two pseudo-buttons: 34 (rotate) and 35 (press).
///
/// # Examples
///
/// ```
/// use hue_switchboard::types::ControlPosition;
///
/// let first = ControlPosition::new(1).unwrap();
/// assert_eq!(first.value(), 1);
/// assert_eq!(first.label(), "ON");
///
/// assert!(ControlPosition::ROTARY_ROTATE.is_rotary());
/// assert!(ControlPosition::new(5).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct ControlPosition(u16);

impl ControlPosition {
    /// Rotary ring rotation on a tap dial.
    pub const ROTARY_ROTATE: Self = Self(34);

    /// Rotary ring press on a tap dial.
    pub const ROTARY_PRESS: Self = Self(35);

    /// Creates a control position.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidControlPosition` unless the value is 1-4,
    /// 34 or 35.
    pub fn new(value: u16) -> Result<Self, ValueError> {
        match value {
            1..=4 | 34 | 35 => Ok(Self(value)),
            other => Err(ValueError::InvalidControlPosition(other)),
        }
    }

    /// Returns the numeric position.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns `true` for the two rotary pseudo-buttons.
    #[must_use]
    pub const fn is_rotary(self) -> bool {
        self.0 == 34 || self.0 == 35
    }

    /// Returns the key used by legacy-shape configurations.
    #[must_use]
    pub fn legacy_key(self) -> String {
        if self.is_rotary() {
            "rotary".to_string()
        } else {
            format!("button{}", self.0)
        }
    }

    /// Returns the label printed on a four-button dimmer switch.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.0 {
            1 => "ON",
            2 => "DIM UP",
            3 => "DIM DOWN",
            4 => "OFF",
            34 => "DIAL ROTATE",
            _ => "DIAL PRESS",
        }
    }
}

impl fmt::Display for ControlPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for ControlPosition {
    type Error = ValueError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ControlPosition> for u16 {
    fn from(position: ControlPosition) -> Self {
        position.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_positions() {
        for v in [1, 2, 3, 4, 34, 35] {
            assert_eq!(ControlPosition::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn invalid_positions() {
        for v in [0, 5, 33, 36, 999] {
            assert_eq!(
                ControlPosition::new(v),
                Err(ValueError::InvalidControlPosition(v))
            );
        }
    }

    #[test]
    fn legacy_keys() {
        assert_eq!(ControlPosition::new(3).unwrap().legacy_key(), "button3");
        assert_eq!(ControlPosition::ROTARY_PRESS.legacy_key(), "rotary");
    }

    #[test]
    fn deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<ControlPosition>("2").is_ok());
        assert!(serde_json::from_str::<ControlPosition>("7").is_err());
    }
}
