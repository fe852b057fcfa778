// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reprogramming buttons with scenes narrowed to the lights of one zone.
//!
//! Every source scene is copied into a derived scene holding only the
//! actions for lights of the zone, minus the lights excluded for that
//! button. A derived scene already on the bridge under the same name is
//! reused. The buttons are then written in a single recreate.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::action::{ButtonAction, ButtonProgram, ObservedAction};
use crate::adapter::{ButtonLookup, resolve_button_slot};
use crate::cache::Collection;
use crate::error::{Error, LookupError, ParseError, Result, ValueError};
use crate::protocol::BridgeApi;
use crate::resolve::{SwitchTarget, resolve_name, resolve_scene};
use crate::types::{ControlPosition, ResourceRef, children, display_name, nested_ref, record_id, record_name};

use super::{BulkReport, ButtonFailure, MutationEngine, NewScene};

/// Longest scene name the bridge accepts.
pub const MAX_SCENE_NAME_LEN: usize = 32;

/// Which buttons of a switch to narrow to which zone.
///
/// # Examples
///
/// ```
/// use hue_switchboard::engine::ZoneProgram;
/// use hue_switchboard::types::ControlPosition;
///
/// let program = ZoneProgram::new("Downstairs")
///     .with_button(ControlPosition::new(1)?)
///     .with_button(ControlPosition::new(2)?)
///     .excluding(ControlPosition::new(2)?, "Back lights");
/// assert_eq!(program.zone(), "Downstairs");
/// assert_eq!(program.buttons().len(), 2);
/// # Ok::<(), hue_switchboard::error::ValueError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneProgram {
    zone: String,
    buttons: BTreeSet<ControlPosition>,
    scenes: Vec<String>,
    exclusions: BTreeMap<ControlPosition, Vec<String>>,
}

impl ZoneProgram {
    /// Starts a program for the named zone.
    #[must_use]
    pub fn new(zone: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            ..Self::default()
        }
    }

    /// Adds a button to reprogram.
    #[must_use]
    pub fn with_button(mut self, position: ControlPosition) -> Self {
        self.buttons.insert(position);
        self
    }

    /// Uses these scenes for every button instead of the scenes each button
    /// recalls now.
    #[must_use]
    pub fn with_scenes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scenes = names.into_iter().map(Into::into).collect();
        self
    }

    /// Leaves a light out of the scenes derived for one button.
    #[must_use]
    pub fn excluding(mut self, position: ControlPosition, light: impl Into<String>) -> Self {
        self.exclusions.entry(position).or_default().push(light.into());
        self
    }

    /// Returns the zone name as entered.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Returns the buttons to reprogram, in position order.
    #[must_use]
    pub fn buttons(&self) -> &BTreeSet<ControlPosition> {
        &self.buttons
    }
}

/// Result of [`MutationEngine::program_zone`].
#[derive(Debug, Default)]
pub struct ZoneReport {
    /// Derived scenes created, as `(id, name)`.
    pub created_scenes: Vec<(String, String)>,
    /// Names of derived scenes that already existed and were reused.
    pub reused_scenes: Vec<String>,
    /// Source scenes with no light left in the zone.
    pub skipped_scenes: Vec<String>,
    /// The switch update.
    pub buttons: BulkReport,
}

/// Names the scene derived from `original` for `zone`.
///
/// Excluded lights are listed after the zone. The result is cut to
/// [`MAX_SCENE_NAME_LEN`] characters.
///
/// # Examples
///
/// ```
/// use hue_switchboard::engine::zone_scene_name;
///
/// assert_eq!(zone_scene_name("Relax", "Lounge", &[]), "Relax (Lounge)");
/// assert_eq!(zone_scene_name("Relax", "Lounge", &["Lamp"]), "Relax (Lounge, no Lamp)");
/// ```
#[must_use]
pub fn zone_scene_name(original: &str, zone: &str, excluded: &[&str]) -> String {
    let name = if excluded.is_empty() {
        format!("{original} ({zone})")
    } else {
        format!("{original} ({zone}, no {})", excluded.join(", "))
    };
    name.chars().take(MAX_SCENE_NAME_LEN).collect()
}

struct Zone {
    group: ResourceRef,
    name: String,
    lights: BTreeSet<String>,
}

/// A light left out of one button's scenes.
struct Excluded {
    id: String,
    name: String,
}

fn named(records: &[Value]) -> Vec<(&str, &str)> {
    records
        .iter()
        .filter_map(|r| Some((record_id(r)?, record_name(r)?)))
        .collect()
}

fn zone_actions(scene: &Value, keep: impl Fn(&str) -> bool) -> Vec<Value> {
    scene
        .get("actions")
        .and_then(Value::as_array)
        .map(|actions| {
            actions
                .iter()
                .filter(|a| nested_ref(a, "target").is_some_and(|t| keep(&t.rid)))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

impl<B: BridgeApi> MutationEngine<'_, B> {
    /// Points buttons of a switch at zone-only copies of their scenes.
    ///
    /// Source scenes are the ones named with [`ZoneProgram::with_scenes`],
    /// otherwise each button's current scenes. Derived scenes are created
    /// auto-dynamic with the source scene's speed. A button left with one
    /// scene recalls it; with several it cycles through them. Buttons that
    /// cannot be located or end up with no scene are reported and skipped.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` if no button was selected or the zone has no
    ///   lights
    /// - `Error::Lookup` for an unknown switch, zone, scene or light name
    /// - `Error::Protocol` if a scene create, the read or the delete failed;
    ///   the switch is unchanged
    /// - `Error::PartialFailure` if the create failed after the delete
    pub async fn program_zone(&mut self, switch_name: &str, program: &ZoneProgram) -> Result<ZoneReport> {
        if program.buttons.is_empty() {
            return Err(ValueError::MissingAction("no button selected".to_string()).into());
        }
        let target = self.find_switch(switch_name).await?;
        let zone = self.resolve_zone(&program.zone)?;
        let provided = program
            .scenes
            .iter()
            .map(|name| resolve_scene(&*self.cache, name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let exclusions = self.resolve_exclusions(&program.exclusions)?;

        tracing::info!(
            switch = %target.name,
            zone = %zone.name,
            lights = zone.lights.len(),
            buttons = program.buttons.len(),
            "Programming switch for zone"
        );

        let mut report = ZoneReport::default();
        let mut programs = Vec::new();
        for &position in &program.buttons {
            let sources = if provided.is_empty() {
                match self.current_scenes(&target, position) {
                    Ok(ids) => ids,
                    Err(error) => {
                        tracing::warn!(switch = %target.name, button = %position, %error, "Skipping button");
                        report.buttons.failed.push(ButtonFailure { position, error });
                        continue;
                    }
                }
            } else {
                provided.clone()
            };

            let excluded = exclusions.get(&position).map_or(&[][..], Vec::as_slice);
            let mut derived = Vec::new();
            for scene_id in &sources {
                if let Some(id) = self
                    .derive_zone_scene(scene_id, &zone, excluded, &mut report)
                    .await?
                {
                    derived.push(id);
                }
            }

            let action = match derived.len() {
                0 => {
                    let error = Error::from(ValueError::NoLights(format!(
                        "zone '{}' for button {position}",
                        zone.name
                    )));
                    tracing::warn!(switch = %target.name, button = %position, %error, "Skipping button");
                    report.buttons.failed.push(ButtonFailure { position, error });
                    continue;
                }
                1 => ButtonAction::single_recall(derived.remove(0))?,
                _ => ButtonAction::scene_cycle(derived)?,
            };
            programs.push((position, ButtonProgram::short(action)));
        }

        if programs.is_empty() {
            tracing::warn!(switch = %target.name, "No button could be programmed for the zone");
            return Ok(report);
        }
        let skipped = std::mem::take(&mut report.buttons);
        report.buttons = self.reprogram_target(&target, &programs, skipped).await?;
        Ok(report)
    }

    fn resolve_zone(&self, name: &str) -> Result<Zone> {
        let zones = self.cache.cached(Collection::Zones);
        let id = resolve_name("zone", name, &named(zones))?;
        let record = self
            .cache
            .find(Collection::Zones, id)
            .ok_or_else(|| ParseError::MissingField("id".to_string()))?;

        let members = children(record);
        let devices: BTreeSet<&str> = members
            .iter()
            .filter(|c| c.rtype == "device")
            .map(|c| c.rid.as_str())
            .collect();
        let mut lights: BTreeSet<String> = members
            .iter()
            .filter(|c| c.rtype == "light")
            .map(|c| c.rid.clone())
            .collect();
        lights.extend(
            self.cache
                .cached(Collection::Lights)
                .iter()
                .filter(|l| nested_ref(l, "owner").is_some_and(|o| devices.contains(o.rid.as_str())))
                .filter_map(record_id)
                .map(str::to_string),
        );

        let zone_name = display_name(record);
        if lights.is_empty() {
            return Err(ValueError::NoLights(format!("zone '{zone_name}'")).into());
        }
        Ok(Zone {
            group: ResourceRef::new(id, "zone"),
            name: zone_name,
            lights,
        })
    }

    fn resolve_exclusions(
        &self,
        requested: &BTreeMap<ControlPosition, Vec<String>>,
    ) -> Result<BTreeMap<ControlPosition, Vec<Excluded>>> {
        let lights = self.cache.cached(Collection::Lights);
        let candidates = named(lights);
        let mut resolved = BTreeMap::new();
        for (position, names) in requested {
            let mut excluded = Vec::new();
            for name in names {
                let id = resolve_name("light", name, &candidates)?;
                let name = candidates
                    .iter()
                    .find(|(candidate, _)| *candidate == id)
                    .map_or(name.as_str(), |&(_, n)| n);
                excluded.push(Excluded {
                    id: id.to_string(),
                    name: name.to_string(),
                });
            }
            resolved.insert(*position, excluded);
        }
        Ok(resolved)
    }

    fn current_scenes(&self, target: &SwitchTarget, position: ControlPosition) -> Result<Vec<String>> {
        let lookup = ButtonLookup::from_records(self.cache.cached(Collection::Buttons));
        let configuration = target
            .instance
            .get("configuration")
            .ok_or_else(|| ParseError::MissingField("configuration".to_string()))?;
        let slot = resolve_button_slot(configuration, position, &lookup)?;
        let ids: Vec<String> = slot
            .entry(configuration)
            .and_then(ObservedAction::from_button)
            .map(|action| action.scene_ids().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(ValueError::MissingAction(format!(
                "button {position} recalls no scene, name the scenes to use"
            ))
            .into());
        }
        Ok(ids)
    }

    async fn derive_zone_scene(
        &mut self,
        scene_id: &str,
        zone: &Zone,
        excluded: &[Excluded],
        report: &mut ZoneReport,
    ) -> Result<Option<String>> {
        let source = self
            .cache
            .find(Collection::Scenes, scene_id)
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                kind: "scene",
                query: scene_id.to_string(),
                suggestions: Vec::new(),
            })?;
        let original = display_name(&source);

        let actions = zone_actions(&source, |rid| {
            zone.lights.contains(rid) && !excluded.iter().any(|e| e.id == rid)
        });
        if actions.is_empty() {
            tracing::debug!(scene = %original, zone = %zone.name, "Scene has no lights in zone");
            report.skipped_scenes.push(original);
            return Ok(None);
        }

        let excluded_names: Vec<&str> = excluded.iter().map(|e| e.name.as_str()).collect();
        let name = zone_scene_name(&original, &zone.name, &excluded_names);
        let existing = self
            .cache
            .cached(Collection::Scenes)
            .iter()
            .find(|s| record_name(s) == Some(name.as_str()))
            .and_then(record_id)
            .map(str::to_string);
        if let Some(id) = existing {
            tracing::debug!(scene = %name, "Reusing zone scene");
            report.reused_scenes.push(name);
            return Ok(Some(id));
        }

        let speed = source
            .get("speed")
            .and_then(Value::as_f64)
            .unwrap_or(NewScene::DEFAULT_SPEED);
        let scene = NewScene::new(name.clone(), zone.group.clone())?
            .with_actions(actions)
            .with_speed(speed);
        let id = self.create_scene(&scene).await?;
        report.created_scenes.push((id.clone(), name));
        Ok(Some(id))
    }
}
