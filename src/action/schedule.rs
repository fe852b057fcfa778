// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-of-day schedules.

use crate::error::ValueError;
use crate::types::TimeOfDay;

/// One schedule entry: from `time` onwards, a press recalls `scene`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot {
    time: TimeOfDay,
    scene: String,
}

impl TimeSlot {
    /// Creates a slot.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank scene identifier.
    pub fn new(time: TimeOfDay, scene: impl Into<String>) -> Result<Self, ValueError> {
        let scene = scene.into();
        if scene.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scene"));
        }
        Ok(Self { time, scene })
    }

    /// Creates a slot from raw hour and minute values.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` for an invalid time and
    /// `ValueError::EmptyIdentifier` for a blank scene.
    pub fn at(hour: u8, minute: u8, scene: impl Into<String>) -> Result<Self, ValueError> {
        Self::new(TimeOfDay::new(hour, minute)?, scene)
    }

    /// Returns the start time.
    #[must_use]
    pub const fn time(&self) -> TimeOfDay {
        self.time
    }

    /// Returns the scene identifier.
    #[must_use]
    pub fn scene(&self) -> &str {
        &self.scene
    }
}

/// A non-empty list of time slots, kept sorted by time of day.
///
/// Slots sharing the same time are allowed; their relative order is kept.
///
/// # Examples
///
/// ```
/// use hue_switchboard::action::{TimeSchedule, TimeSlot};
///
/// let schedule = TimeSchedule::new(vec![
///     TimeSlot::at(20, 0, "evening").unwrap(),
///     TimeSlot::at(7, 0, "morning").unwrap(),
/// ])
/// .unwrap();
///
/// assert_eq!(schedule.slots()[0].scene(), "morning");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeSchedule {
    slots: Vec<TimeSlot>,
}

impl TimeSchedule {
    /// Creates a schedule, sorting the slots by time of day.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptySchedule` if no slots are given.
    pub fn new(mut slots: Vec<TimeSlot>) -> Result<Self, ValueError> {
        if slots.is_empty() {
            return Err(ValueError::EmptySchedule);
        }
        slots.sort_by_key(TimeSlot::time);
        if slots.windows(2).any(|w| w[0].time == w[1].time) {
            tracing::warn!("time-based schedule has several slots starting at the same time");
        }
        Ok(Self { slots })
    }

    /// Returns the slots in time order.
    #[must_use]
    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    /// Returns the slot in effect at `now`.
    ///
    /// Before the first slot of the day, the last slot of the previous day
    /// still applies.
    #[must_use]
    pub fn active_at(&self, now: TimeOfDay) -> Option<&TimeSlot> {
        self.slots
            .iter()
            .rev()
            .find(|slot| slot.time <= now)
            .or_else(|| self.slots.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(h: u8, m: u8, s: &str) -> TimeSlot {
        TimeSlot::at(h, m, s).unwrap()
    }

    #[test]
    fn empty_schedule_rejected() {
        assert_eq!(TimeSchedule::new(vec![]), Err(ValueError::EmptySchedule));
    }

    #[test]
    fn slots_sorted_regardless_of_input_order() {
        let a = TimeSchedule::new(vec![slot(20, 0, "c"), slot(7, 0, "a"), slot(12, 30, "b")])
            .unwrap();
        let b = TimeSchedule::new(vec![slot(12, 30, "b"), slot(20, 0, "c"), slot(7, 0, "a")])
            .unwrap();
        assert_eq!(a, b);
        let scenes: Vec<_> = a.slots().iter().map(TimeSlot::scene).collect();
        assert_eq!(scenes, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_times_permitted() {
        let schedule = TimeSchedule::new(vec![slot(7, 0, "a"), slot(7, 0, "b")]).unwrap();
        assert_eq!(schedule.slots().len(), 2);
    }

    #[test]
    fn active_slot_wraps_around_midnight() {
        let schedule = TimeSchedule::new(vec![slot(7, 0, "day"), slot(21, 0, "night")]).unwrap();
        let at = |h| {
            schedule
                .active_at(TimeOfDay::new(h, 0).unwrap())
                .map(TimeSlot::scene)
        };
        assert_eq!(at(12), Some("day"));
        assert_eq!(at(22), Some("night"));
        assert_eq!(at(3), Some("night"));
    }

    #[test]
    fn invalid_slot_time() {
        assert!(TimeSlot::at(24, 0, "x").is_err());
        assert!(TimeSlot::at(10, 0, "").is_err());
    }
}
