// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-clock time used by time-based schedules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// An hour and minute of the day.
///
/// Ordering follows the clock, so sorting a list of times yields the order in
/// which the schedule slots take effect.
///
/// # Examples
///
/// ```
/// use hue_switchboard::types::TimeOfDay;
///
/// let morning = TimeOfDay::new(7, 30).unwrap();
/// assert_eq!(morning.to_string(), "07:30");
///
/// let parsed: TimeOfDay = "21:05".parse().unwrap();
/// assert!(morning < parsed);
///
/// assert!(TimeOfDay::new(24, 0).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Midnight.
    pub const MIDNIGHT: Self = Self { hour: 0, minute: 0 };

    /// Creates a time of day.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if the hour is above 23 or the minute
    /// above 59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValueError> {
        if hour > 23 {
            return Err(ValueError::OutOfRange {
                field: "hour",
                min: 0,
                max: 23,
                actual: i64::from(hour),
            });
        }
        if minute > 59 {
            return Err(ValueError::OutOfRange {
                field: "minute",
                min: 0,
                max: 59,
                actual: i64::from(minute),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Creates a time of day from unconstrained integers, as read from a
    /// document or typed by a user.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for negative or too-large values.
    pub fn from_i64(hour: i64, minute: i64) -> Result<Self, ValueError> {
        let h = u8::try_from(hour).map_err(|_| ValueError::OutOfRange {
            field: "hour",
            min: 0,
            max: 23,
            actual: hour,
        })?;
        let m = u8::try_from(minute).map_err(|_| ValueError::OutOfRange {
            field: "minute",
            min: 0,
            max: 59,
            actual: minute,
        })?;
        Self::new(h, m)
    }

    /// Returns the hour (0-23).
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Returns the minute (0-59).
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValueError::InvalidTimeSlot {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| invalid("expected HH:MM"))?;
        let hour: i64 = hour
            .trim()
            .parse()
            .map_err(|_| invalid("hour and minute must be integers"))?;
        let minute: i64 = minute
            .trim()
            .parse()
            .map_err(|_| invalid("hour and minute must be integers"))?;

        Self::from_i64(hour, minute)
    }
}
