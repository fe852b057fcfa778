// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::{ButtonLookup, button_entries, instance_device_id};
use crate::action::ObservedAction;
use crate::types::{ControlPosition, display_name, record_id};

/// A scene programmed on a switch button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneAssignment {
    /// Recalled scene.
    pub scene_id: String,
    /// Behaviour instance holding the button.
    pub instance_id: String,
    /// Name of the switch device.
    pub switch_name: String,
    /// Button label, e.g. `ON` or `DIM UP`.
    pub button: String,
    /// How the scene is triggered, e.g. `cycle (short press)`.
    pub trigger: String,
}

/// Lists every scene recalled by a switch button, across all instances.
///
/// `devices` supplies switch names; `lookup` supplies control positions for
/// addressed instances. Results follow instance order, then control order.
#[must_use]
pub fn scene_assignments(
    instances: &[Value],
    devices: &[Value],
    lookup: &ButtonLookup,
) -> Vec<SceneAssignment> {
    let names: HashMap<&str, String> = devices
        .iter()
        .filter_map(|d| Some((record_id(d)?, display_name(d))))
        .collect();

    let mut out = Vec::new();
    for instance in instances {
        let (Some(device), Some(configuration), Some(instance_id)) = (
            instance_device_id(instance),
            instance.get("configuration"),
            record_id(instance),
        ) else {
            continue;
        };
        let switch_name = names
            .get(device)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());

        for entry in button_entries(configuration, lookup) {
            let button = button_label(entry.position);
            let mut push = |scene_id: &str, trigger: String| {
                out.push(SceneAssignment {
                    scene_id: scene_id.to_string(),
                    instance_id: instance_id.to_string(),
                    switch_name: switch_name.clone(),
                    button: button.clone(),
                    trigger,
                });
            };

            match ObservedAction::from_button(entry.entry) {
                Some(ObservedAction::SceneCycle(ids)) => {
                    for id in &ids {
                        push(id, "cycle (short press)".to_string());
                    }
                }
                Some(ObservedAction::TimeBased(slots)) => {
                    for (time, id) in &slots {
                        push(id, format!("time-based (short press, {time})"));
                    }
                }
                Some(ObservedAction::SingleRecall(ids)) => {
                    for id in &ids {
                        push(id, "single (short press)".to_string());
                    }
                }
                _ => {}
            }

            if let Some(id) = entry
                .entry
                .get("on_long_press")
                .and_then(|lp| lp.get("recall"))
                .and_then(|r| r.get("rid"))
                .and_then(Value::as_str)
            {
                push(id, "long press".to_string());
            }
        }
    }
    out
}

fn button_label(position: Option<u16>) -> String {
    match position.map(ControlPosition::new) {
        Some(Ok(p)) => p.label().to_string(),
        Some(Err(_)) => format!("Button {}", position.unwrap_or_default()),
        None => "Unknown".to_string(),
    }
}
