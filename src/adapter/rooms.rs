// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde_json::Value;

use super::ROTARY_KEY;
use crate::types::ResourceRef;

/// Collects the zones and rooms a configuration refers to.
///
/// `where` lists can sit at the top level, inside each legacy `buttonN`
/// entry, inside `rotary`, and inside each addressed `buttons` entry. The
/// result is deduplicated and keeps first-seen order.
///
/// # Examples
///
/// ```
/// use hue_switchboard::adapter::extract_room_references;
/// use serde_json::json;
///
/// let config = json!({
///     "where": [{"group": {"rid": "room-1", "rtype": "room"}}],
///     "buttons": {
///         "b1": {"where": [{"group": {"rid": "zone-9", "rtype": "zone"}}]},
///         "b2": {"where": [{"group": {"rid": "room-1", "rtype": "room"}}]}
///     }
/// });
///
/// let rids: Vec<_> = extract_room_references(&config).into_iter().map(|r| r.rid).collect();
/// assert_eq!(rids, vec!["room-1", "zone-9"]);
/// ```
#[must_use]
pub fn extract_room_references(configuration: &Value) -> Vec<ResourceRef> {
    let mut lists: Vec<&Value> = Vec::new();

    if let Some(top) = configuration.get("where") {
        lists.push(top);
    }
    for index in 1..=4 {
        if let Some(list) = configuration
            .get(format!("button{index}"))
            .and_then(|b| b.get("where"))
        {
            lists.push(list);
        }
    }
    if let Some(list) = configuration.get(ROTARY_KEY).and_then(|r| r.get("where")) {
        lists.push(list);
    }
    if let Some(buttons) = configuration.get("buttons").and_then(Value::as_object) {
        lists.extend(buttons.values().filter_map(|b| b.get("where")));
    }

    let mut found: Vec<ResourceRef> = Vec::new();
    for item in lists.into_iter().filter_map(Value::as_array).flatten() {
        if let Some(group) = item.get("group").and_then(ResourceRef::from_value) {
            if !found.contains(&group) {
                found.push(group);
            }
        }
    }
    found
}
