// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene writes.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::cache::Collection;
use crate::error::{LookupError, ParseError, ProtocolError, Result, ValueError};
use crate::protocol::{BridgeApi, created_id, fetch_record};
use crate::resolve::{SUGGESTION_LIMIT, find_similar, resolve_name, resolve_scope};
use crate::types::{ResourceRef, ResourceType, nested_ref, record_id, record_name};

use super::MutationEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct SceneMetadata {
    name: String,
}

/// Body of a scene create request.
///
/// # Examples
///
/// ```
/// use hue_switchboard::engine::NewScene;
/// use hue_switchboard::types::ResourceRef;
///
/// let scene = NewScene::new("Evening", ResourceRef::new("zone-1", "zone"))
///     .unwrap()
///     .with_speed(0.4)
///     .with_auto_dynamic(false);
/// assert_eq!(scene.name(), "Evening");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScene {
    metadata: SceneMetadata,
    group: ResourceRef,
    actions: Vec<Value>,
    auto_dynamic: bool,
    speed: f64,
}

impl NewScene {
    /// Default dynamic palette speed.
    pub const DEFAULT_SPEED: f64 = 0.6;

    /// Creates an auto-dynamic scene for a zone or room.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank name or group.
    pub fn new(name: impl Into<String>, group: ResourceRef) -> std::result::Result<Self, ValueError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scene name"));
        }
        if group.rid.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("group"));
        }
        Ok(Self {
            metadata: SceneMetadata { name },
            group,
            actions: Vec::new(),
            auto_dynamic: true,
            speed: Self::DEFAULT_SPEED,
        })
    }

    /// Sets the per-light actions (`{"target": ..., "action": ...}`).
    #[must_use]
    pub fn with_actions(mut self, actions: Vec<Value>) -> Self {
        self.actions = actions;
        self
    }

    /// Enables or disables palette cycling.
    #[must_use]
    pub fn with_auto_dynamic(mut self, auto_dynamic: bool) -> Self {
        self.auto_dynamic = auto_dynamic;
        self
    }

    /// Sets the dynamic speed, clamped to `0.0..=1.0`.
    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed.clamp(0.0, 1.0);
        self
    }

    /// Returns the scene name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// A change made to the copy of a scene. Lights are named as the user
/// knows them.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEdit {
    /// Switch a light off, dropping its brightness and colour. A light the
    /// scene does not hold is added switched off.
    TurnOff(String),
    /// Switch a light on. A light the scene does not hold is added at full
    /// brightness.
    TurnOn(String),
    /// Set the brightness of a light already in the scene and switch it on.
    Brightness {
        /// Light name.
        light: String,
        /// Brightness in percent.
        percent: f64,
    },
    /// Drop a light from the scene. Absent lights are skipped.
    RemoveLight(String),
}

impl SceneEdit {
    /// Creates a brightness edit.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` above 100 percent.
    pub fn brightness(light: impl Into<String>, percent: u16) -> std::result::Result<Self, ValueError> {
        if percent > 100 {
            return Err(ValueError::OutOfRange {
                field: "brightness",
                min: 0,
                max: 100,
                actual: i64::from(percent),
            });
        }
        Ok(Self::Brightness {
            light: light.into(),
            percent: f64::from(percent),
        })
    }

    fn light(&self) -> &str {
        match self {
            Self::TurnOff(light)
            | Self::TurnOn(light)
            | Self::RemoveLight(light)
            | Self::Brightness { light, .. } => light,
        }
    }
}

/// Copy an existing scene under a new name, with edits.
///
/// # Examples
///
/// ```
/// use hue_switchboard::engine::{SceneDuplicate, SceneEdit};
///
/// let request = SceneDuplicate::new("Reading", "Reading dimmed")?
///     .in_group("Lounge")
///     .with_edit(SceneEdit::TurnOff("Back lights".into()))
///     .with_edit(SceneEdit::brightness("Sofa lamp", 50)?);
/// assert_eq!(request.edits().len(), 2);
/// # Ok::<(), hue_switchboard::error::ValueError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDuplicate {
    source: String,
    name: String,
    group: Option<String>,
    edits: Vec<SceneEdit>,
}

impl SceneDuplicate {
    /// Copies the scene matching `source` into a scene called `name`.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyIdentifier` for a blank name.
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> std::result::Result<Self, ValueError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValueError::EmptyIdentifier("scene name"));
        }
        Ok(Self {
            source: source.into(),
            name,
            group: None,
            edits: Vec::new(),
        })
    }

    /// Only considers source scenes of this zone or room.
    #[must_use]
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Adds an edit. Edits apply in the order given.
    #[must_use]
    pub fn with_edit(mut self, edit: SceneEdit) -> Self {
        self.edits.push(edit);
        self
    }

    /// Returns the edits.
    #[must_use]
    pub fn edits(&self) -> &[SceneEdit] {
        &self.edits
    }
}

/// Result of [`MutationEngine::duplicate_scene`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicatedScene {
    /// Identifier of the new scene.
    pub id: String,
    /// Identifier of the copied scene.
    pub source_id: String,
    /// Number of light actions in the new scene.
    pub light_count: usize,
    /// Lights asked to be removed that the scene did not hold.
    pub skipped: Vec<String>,
}

fn action_for<'v>(actions: &'v mut [Value], light_id: &str) -> Option<&'v mut Map<String, Value>> {
    actions
        .iter_mut()
        .find(|a| nested_ref(a, "target").is_some_and(|t| t.rid == light_id))
        .and_then(|a| a.get_mut("action"))
        .and_then(Value::as_object_mut)
}

fn light_action(light_id: &str, action: Value) -> Value {
    json!({"target": {"rid": light_id, "rtype": "light"}, "action": action})
}

/// Applies one edit. Returns `false` for a removal of an absent light.
fn apply_edit(actions: &mut Vec<Value>, edit: &SceneEdit, light_id: &str) -> std::result::Result<bool, LookupError> {
    match edit {
        SceneEdit::TurnOff(_) => match action_for(actions, light_id) {
            Some(action) => {
                action.insert("on".to_string(), json!({"on": false}));
                for key in ["dimming", "color", "color_temperature"] {
                    action.remove(key);
                }
            }
            None => actions.push(light_action(light_id, json!({"on": {"on": false}}))),
        },
        SceneEdit::TurnOn(_) => match action_for(actions, light_id) {
            Some(action) => {
                action.insert("on".to_string(), json!({"on": true}));
            }
            None => actions.push(light_action(
                light_id,
                json!({"on": {"on": true}, "dimming": {"brightness": 100.0}}),
            )),
        },
        SceneEdit::Brightness { light, percent } => {
            let action = action_for(actions, light_id).ok_or_else(|| LookupError::NotFound {
                kind: "light in scene",
                query: light.clone(),
                suggestions: Vec::new(),
            })?;
            action
                .entry("on")
                .or_insert_with(|| json!({"on": true}));
            action.insert("dimming".to_string(), json!({"brightness": percent}));
        }
        SceneEdit::RemoveLight(_) => {
            let before = actions.len();
            actions.retain(|a| nested_ref(a, "target").is_none_or(|t| t.rid != light_id));
            return Ok(actions.len() != before);
        }
    }
    Ok(true)
}

impl<B: BridgeApi> MutationEngine<'_, B> {
    /// Creates a scene and adds it to the cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the create.
    pub async fn create_scene(&mut self, scene: &NewScene) -> Result<String> {
        let body = serde_json::to_value(scene).map_err(ParseError::from)?;
        let refs = self.bridge.post(ResourceType::Scene, &body).await?;
        let id = created_id(&refs).ok_or_else(|| {
            ProtocolError::MalformedEnvelope("create response carried no reference".to_string())
        })?;

        match fetch_record(self.bridge, ResourceType::Scene, &id).await {
            Ok(record) => self.cache.upsert(Collection::Scenes, record)?,
            Err(e) => {
                tracing::warn!(scene = %id, error = %e, "Created scene not cached, reload to pick it up");
            }
        }
        tracing::info!(scene = %id, name = scene.name(), "Scene created");
        Ok(id)
    }

    /// Turns palette cycling of a scene on or off.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the update.
    pub async fn set_auto_dynamic(&mut self, scene_id: &str, auto_dynamic: bool) -> Result<()> {
        self.bridge
            .put(
                ResourceType::Scene,
                scene_id,
                &json!({"auto_dynamic": auto_dynamic}),
            )
            .await?;

        match fetch_record(self.bridge, ResourceType::Scene, scene_id).await {
            Ok(record) => self.cache.upsert(Collection::Scenes, record)?,
            Err(e) => {
                tracing::warn!(scene = %scene_id, error = %e, "Could not read back updated scene");
            }
        }
        tracing::info!(scene = %scene_id, auto_dynamic, "Scene updated");
        Ok(())
    }

    /// Deletes a scene and drops it from the cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the delete.
    pub async fn delete_scene(&mut self, scene_id: &str) -> Result<()> {
        self.bridge.delete(ResourceType::Scene, scene_id).await?;
        self.cache.remove(Collection::Scenes, scene_id)?;
        tracing::info!(scene = %scene_id, "Scene deleted");
        Ok(())
    }

    /// Creates a copy of a scene with edits applied.
    ///
    /// The copy keeps the source scene's group, palette cycling (on when
    /// unset) and speed. Every name is resolved before anything is written.
    ///
    /// # Errors
    ///
    /// - `Error::Lookup` for an unknown group, scene or light, or a
    ///   brightness edit on a light the scene does not hold
    /// - `Error::Parse` if the source scene has no group
    /// - `Error::Protocol` if the bridge rejected the create
    pub async fn duplicate_scene(&mut self, request: &SceneDuplicate) -> Result<DuplicatedScene> {
        self.cache.ensure_fresh(self.bridge).await?;

        let group = request
            .group
            .as_deref()
            .map(|name| resolve_scope(&*self.cache, name))
            .transpose()?;
        let scenes: Vec<(&str, &str)> = self
            .cache
            .cached(Collection::Scenes)
            .iter()
            .filter(|s| {
                group
                    .as_ref()
                    .is_none_or(|g| nested_ref(s, "group").is_some_and(|sg| sg.rid == g.rid))
            })
            .filter_map(|s| Some((record_id(s)?, record_name(s)?)))
            .collect();
        let source_id = resolve_name("scene", &request.source, &scenes)?.to_string();
        let source = self
            .cache
            .find(Collection::Scenes, &source_id)
            .cloned()
            .ok_or_else(|| ParseError::MissingField("id".to_string()))?;
        let source_group =
            nested_ref(&source, "group").ok_or_else(|| ParseError::MissingField("group".to_string()))?;

        let lights: Vec<(&str, &str)> = self
            .cache
            .cached(Collection::Lights)
            .iter()
            .filter_map(|l| Some((record_id(l)?, record_name(l)?)))
            .collect();
        let mut actions: Vec<Value> = source
            .get("actions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut skipped = Vec::new();
        for edit in &request.edits {
            let light_id = resolve_name("light", edit.light(), &lights)?;
            match apply_edit(&mut actions, edit, light_id) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(light = edit.light(), "Light not in scene, nothing to remove");
                    skipped.push(edit.light().to_string());
                }
                Err(LookupError::NotFound { kind, query, .. }) => {
                    let in_scene: Vec<&str> = lights
                        .iter()
                        .filter(|(id, _)| {
                            actions
                                .iter()
                                .any(|a| nested_ref(a, "target").is_some_and(|t| t.rid == *id))
                        })
                        .map(|&(_, name)| name)
                        .collect();
                    return Err(LookupError::NotFound {
                        kind,
                        suggestions: find_similar(&query, in_scene, SUGGESTION_LIMIT),
                        query,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }
        }

        let light_count = actions.len();
        let scene = NewScene::new(request.name.clone(), source_group)?
            .with_actions(actions)
            .with_auto_dynamic(
                source
                    .get("auto_dynamic")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            )
            .with_speed(
                source
                    .get("speed")
                    .and_then(Value::as_f64)
                    .unwrap_or(NewScene::DEFAULT_SPEED),
            );
        let id = self.create_scene(&scene).await?;
        tracing::info!(source = %source_id, scene = %id, edits = request.edits.len(), "Scene duplicated");
        Ok(DuplicatedScene {
            id,
            source_id,
            light_count,
            skipped,
        })
    }

    /// Recalls a scene. The cache is not touched.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the recall.
    pub async fn activate_scene(&self, scene_id: &str) -> Result<()> {
        self.bridge
            .put(
                ResourceType::Scene,
                scene_id,
                &json!({"recall": {"action": "active"}}),
            )
            .await?;
        tracing::debug!(scene = %scene_id, "Scene recalled");
        Ok(())
    }
}
