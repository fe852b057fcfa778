// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of numeric switch event codes.
//!
//! Switches report presses as `XYYY`, where `X` is the button (1-5, or
//! `34`/`35` for tap dials) and `YYY` the event type.

use std::fmt;

/// What happened to a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressKind {
    /// The button went down.
    InitialPress,
    /// The button is being held.
    Hold,
    /// Released after a short press.
    ShortRelease,
    /// Released after a long press.
    LongRelease,
}

impl PressKind {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "000" => Some(Self::InitialPress),
            "001" => Some(Self::Hold),
            "002" => Some(Self::ShortRelease),
            "003" => Some(Self::LongRelease),
            _ => None,
        }
    }

    /// Full label, e.g. `Short Release`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InitialPress => "Initial Press",
            Self::Hold => "Hold",
            Self::ShortRelease => "Short Release",
            Self::LongRelease => "Long Release",
        }
    }

    /// Abbreviated label, e.g. `SR`.
    #[must_use]
    pub const fn short_label(self) -> &'static str {
        match self {
            Self::InitialPress => "IP",
            Self::Hold => "H",
            Self::ShortRelease => "SR",
            Self::LongRelease => "LR",
        }
    }
}

/// A decoded `XYYY` event code.
///
/// # Examples
///
/// ```
/// use hue_switchboard::types::{ButtonEventCode, PressKind};
///
/// let code = ButtonEventCode::decode(1002).unwrap();
/// assert_eq!(code.button(), 1);
/// assert_eq!(code.kind(), PressKind::ShortRelease);
/// assert_eq!(code.to_string(), "On (Short Release)");
/// assert_eq!(code.compact(), "On SR");
///
/// let dial = ButtonEventCode::decode(34001).unwrap();
/// assert_eq!(dial.compact(), "Dial Rotate H");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonEventCode {
    raw: u32,
    button: u16,
    kind: PressKind,
}

impl ButtonEventCode {
    /// Decodes a raw event code, returning `None` for unknown layouts.
    #[must_use]
    pub fn decode(raw: u32) -> Option<Self> {
        let text = raw.to_string();
        if text.len() < 4 {
            return None;
        }
        let split = if text.starts_with("34") || text.starts_with("35") {
            2
        } else {
            1
        };
        let (button, event) = text.split_at(split);
        let kind = PressKind::from_code(event)?;
        let button = button.parse().ok()?;
        Some(Self { raw, button, kind })
    }

    /// Returns the raw numeric code.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.raw
    }

    /// Returns the button number.
    #[must_use]
    pub const fn button(self) -> u16 {
        self.button
    }

    /// Returns the press kind.
    #[must_use]
    pub const fn kind(self) -> PressKind {
        self.kind
    }

    /// Human-readable button name.
    #[must_use]
    pub fn button_name(self) -> String {
        match self.button {
            1 => "On".to_string(),
            2 => "Dim Up".to_string(),
            3 => "Dim Down".to_string(),
            4 => "Off".to_string(),
            5 => "Special".to_string(),
            34 => "Dial Rotate".to_string(),
            35 => "Dial Press".to_string(),
            n => format!("Button {n}"),
        }
    }

    /// Abbreviated form, e.g. `On SR`.
    #[must_use]
    pub fn compact(self) -> String {
        format!("{} {}", self.button_name(), self.kind.short_label())
    }
}

impl fmt::Display for ButtonEventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.button_name(), self.kind.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_regular_buttons() {
        let code = ButtonEventCode::decode(4003).unwrap();
        assert_eq!(code.button(), 4);
        assert_eq!(code.kind(), PressKind::LongRelease);
        assert_eq!(code.to_string(), "Off (Long Release)");
    }

    #[test]
    fn decodes_dial() {
        let code = ButtonEventCode::decode(35002).unwrap();
        assert_eq!(code.button(), 35);
        assert_eq!(code.to_string(), "Dial Press (Short Release)");
    }

    #[test]
    fn rejects_short_or_unknown_codes() {
        assert!(ButtonEventCode::decode(12).is_none());
        assert!(ButtonEventCode::decode(1009).is_none());
    }
}
