// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Whole-instance request bodies.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use super::{SceneCycleBody, Seconds, ShortRelease, WhereEntry, WithOff};
use crate::types::ResourceRef;

/// Script identifier of the bridge's standard switch behaviour.
pub const BUTTON_SCRIPT_ID: &str = "67d9395b-4403-42cc-b5f0-740b699d67c6";

/// Body of an in-place update (`PUT behavior_instance/<id>`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceUpdate {
    /// The complete merged configuration.
    pub configuration: Value,
    /// Enabled flag carried over from the existing instance.
    pub enabled: bool,
    /// Metadata carried over from the existing instance.
    pub metadata: Value,
}

/// Body of a create request (`POST behavior_instance`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceCreate {
    /// Script the instance runs.
    pub script_id: String,
    /// Enabled flag.
    pub enabled: bool,
    /// The complete configuration.
    pub configuration: Value,
    /// Metadata, typically `{"name": ...}`.
    pub metadata: Value,
}

impl InstanceCreate {
    /// Builds a create body that replaces `previous`, keeping its script and
    /// metadata but carrying a new configuration.
    #[must_use]
    pub fn replacing(previous: &Value, configuration: Value) -> Self {
        Self {
            script_id: previous
                .get("script_id")
                .and_then(Value::as_str)
                .unwrap_or(BUTTON_SCRIPT_ID)
                .to_string(),
            enabled: previous
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            configuration,
            metadata: previous
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| json!({})),
        }
    }
}

/// What is needed to program a switch for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialSwitch {
    /// Device identifier.
    pub device_id: String,
    /// Device display name.
    pub name: String,
    /// Product model identifier, may be empty.
    pub model_id: String,
    /// Button service identifiers in control order. Only the first four are
    /// programmed.
    pub buttons: Vec<String>,
    /// Room or zone the switch controls.
    pub scope: ResourceRef,
}

#[derive(Serialize)]
struct InitialButton {
    on_short_release: ShortRelease,
    #[serde(rename = "where")]
    scope: Vec<WhereEntry>,
}

#[derive(Serialize)]
struct InitialConfiguration {
    device: ResourceRef,
    model_id: String,
    #[serde(rename = "where")]
    scope: Vec<WhereEntry>,
    buttons: BTreeMap<String, InitialButton>,
}

/// Builds the create body for a switch without a behaviour instance.
///
/// Every button gets an empty scene cycle scoped to the switch's room or
/// zone, in the addressed shape.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn build_initial_configuration(
    switch: &InitialSwitch,
) -> Result<InstanceCreate, serde_json::Error> {
    let scope = || {
        vec![WhereEntry {
            group: switch.scope.clone(),
        }]
    };

    let buttons = switch
        .buttons
        .iter()
        .take(4)
        .map(|rid| {
            let entry = InitialButton {
                on_short_release: ShortRelease::SceneCycle(SceneCycleBody {
                    repeat_timeout: Seconds {
                        seconds: super::REPEAT_TIMEOUT_SECONDS,
                    },
                    slots: Vec::new(),
                    with_off: WithOff { enabled: false },
                }),
                scope: scope(),
            };
            (rid.clone(), entry)
        })
        .collect();

    let configuration = InitialConfiguration {
        device: ResourceRef::new(switch.device_id.as_str(), "device"),
        model_id: switch.model_id.clone(),
        scope: scope(),
        buttons,
    };

    Ok(InstanceCreate {
        script_id: BUTTON_SCRIPT_ID.to_string(),
        enabled: true,
        configuration: serde_json::to_value(configuration)?,
        metadata: json!({ "name": switch.name }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn switch(buttons: usize) -> InitialSwitch {
        InitialSwitch {
            device_id: "dev-1".into(),
            name: "Office dimmer".into(),
            model_id: "RWL022".into(),
            buttons: (1..=buttons).map(|i| format!("btn-{i}")).collect(),
            scope: ResourceRef::new("room-1", "room"),
        }
    }

    #[test]
    fn initial_configuration_is_addressed() {
        let body = build_initial_configuration(&switch(4)).unwrap();
        assert_eq!(body.script_id, BUTTON_SCRIPT_ID);
        assert!(body.enabled);
        assert_eq!(body.metadata["name"], "Office dimmer");

        let config = &body.configuration;
        assert_eq!(config["device"], json!({"rid": "dev-1", "rtype": "device"}));
        assert_eq!(config["model_id"], "RWL022");
        assert_eq!(
            config["where"],
            json!([{"group": {"rid": "room-1", "rtype": "room"}}])
        );
        let buttons = config["buttons"].as_object().unwrap();
        assert_eq!(buttons.len(), 4);
        assert_eq!(
            buttons["btn-2"]["on_short_release"]["scene_cycle_extended"]["slots"],
            json!([])
        );
    }

    #[test]
    fn only_four_buttons_programmed() {
        let body = build_initial_configuration(&switch(6)).unwrap();
        assert_eq!(body.configuration["buttons"].as_object().unwrap().len(), 4);
    }

    #[test]
    fn replacing_keeps_script_and_metadata() {
        let previous = json!({
            "id": "old",
            "script_id": "script-x",
            "enabled": false,
            "metadata": {"name": "Hall"}
        });
        let body = InstanceCreate::replacing(&previous, json!({"buttons": {}}));
        assert_eq!(body.script_id, "script-x");
        assert!(!body.enabled);
        assert_eq!(body.metadata, json!({"name": "Hall"}));
    }
}
