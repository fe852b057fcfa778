// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! These types provide validated representations of the small values the
//! bridge exchanges: resource references, button control positions, times of
//! day and switch event codes.

mod button_event;
mod control;
mod resource;
mod time_of_day;

pub use button_event::{ButtonEventCode, PressKind};
pub use control::ControlPosition;
pub use resource::{
    ResourceRef, ResourceType, child_device_ids, children, display_name, nested_ref, record_id,
    record_name,
};
pub use time_of_day::TimeOfDay;
