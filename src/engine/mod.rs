// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Applying button programs to switches on the bridge.
//!
//! The bridge accepts partial updates of a behaviour instance only while
//! every button keeps its action kind. [`MutationEngine`] therefore decides
//! once per mutation between two strategies:
//!
//! - [`UpdateStrategy::InPlace`]: a single `PUT` of the merged configuration.
//! - [`UpdateStrategy::Recreate`]: `DELETE` the instance, then `POST` a new one
//!   carrying the previous script and metadata plus the merged configuration.
//!
//! The cache is written only after the bridge accepted a change. If the
//! delete of a recreate succeeds but the create fails, the instance is
//! removed from the cache and [`Error::PartialFailure`] is returned. That
//! error is never retried.

mod bulk;
mod scenes;
mod zones;

pub use bulk::{BulkReport, ButtonFailure};
pub use scenes::{DuplicatedScene, NewScene, SceneDuplicate, SceneEdit};
pub use zones::{MAX_SCENE_NAME_LEN, ZoneProgram, ZoneReport, zone_scene_name};

use std::fmt;

use serde_json::{Value, json};

use crate::action::{ActionKind, ButtonProgram, ObservedAction, ProgramRequest};
use crate::adapter::{ButtonLookup, SlotKey, instance_device_id, is_switch_instance, resolve_button_slot};
use crate::builder::{InitialSwitch, InstanceCreate, InstanceUpdate, build_initial_configuration, build_program};
use crate::cache::{BridgeCache, Collection};
use crate::error::{Error, ParseError, ProtocolError, Result, ValueError};
use crate::protocol::{BridgeApi, created_id, fetch_record};
use crate::resolve::{SwitchTarget, resolve_name, resolve_program, resolve_scope, resolve_switch};
use crate::types::{ControlPosition, ResourceType, display_name, record_id, record_name};

/// How a behaviour instance is written back to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStrategy {
    /// One `PUT` of the merged configuration.
    InPlace,
    /// `DELETE` then `POST` of a replacement instance.
    Recreate,
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InPlace => "in-place update",
            Self::Recreate => "delete and recreate",
        })
    }
}

/// Picks the strategy for replacing `existing` with an action of kind
/// `requested`.
///
/// A button without a short-press action, or a request that only sets the
/// long press, is updated in place. Any other change of kind, including
/// replacing an action this library does not model, needs a recreate.
///
/// # Examples
///
/// ```
/// use hue_switchboard::action::{ActionKind, DimDirection, ObservedAction};
/// use hue_switchboard::engine::{UpdateStrategy, decide_strategy};
///
/// let cycle = ObservedAction::SceneCycle(vec!["a".into(), "b".into()]);
/// assert_eq!(decide_strategy(Some(&cycle), Some(ActionKind::SceneCycle)), UpdateStrategy::InPlace);
/// assert_eq!(decide_strategy(Some(&cycle), Some(ActionKind::Dimming)), UpdateStrategy::Recreate);
/// assert_eq!(decide_strategy(None, Some(ActionKind::Dimming)), UpdateStrategy::InPlace);
/// ```
#[must_use]
pub fn decide_strategy(
    existing: Option<&ObservedAction>,
    requested: Option<ActionKind>,
) -> UpdateStrategy {
    match (existing, requested) {
        (Some(existing), Some(requested)) if existing.kind() != Some(requested) => {
            UpdateStrategy::Recreate
        }
        _ => UpdateStrategy::InPlace,
    }
}

/// Merges a program into the button entry at `slot`, creating the entry if
/// needed.
///
/// Only the keys the program produces are replaced; `where` scoping and any
/// other keys stay unless the program sets them. A stale `on_repeat` is
/// dropped when the new short press is not dimming.
///
/// # Errors
///
/// Returns `ParseError::UnexpectedFormat` if the configuration is not an
/// object.
pub fn merge_program(
    configuration: &mut Value,
    slot: &SlotKey,
    program: &ButtonProgram,
) -> std::result::Result<(), ParseError> {
    let fragment = build_program(program).to_value()?;
    let entry = slot.entry_mut(configuration).ok_or_else(|| {
        ParseError::UnexpectedFormat(format!("cannot hold button entry '{slot}'"))
    })?;

    if let Value::Object(fields) = fragment {
        for (key, value) in fields {
            entry.insert(key, value);
        }
    }
    if program
        .short_press()
        .is_some_and(|action| action.kind() != ActionKind::Dimming)
    {
        entry.remove("on_repeat");
    }
    Ok(())
}

/// What a successful mutation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Switch display name.
    pub switch: String,
    /// Strategy used.
    pub strategy: UpdateStrategy,
    /// Identifier of the instance before the mutation.
    pub previous_instance_id: String,
    /// Identifier of the instance now programming the switch. Differs from
    /// `previous_instance_id` after a recreate.
    pub instance_id: String,
}

/// Applies changes to behaviour instances and keeps the cache in step.
///
/// The engine borrows the bridge client and the cache for its lifetime;
/// remote calls are issued one at a time.
///
/// # Examples
///
/// ```no_run
/// use hue_switchboard::action::ButtonProgram;
/// use hue_switchboard::action::ButtonAction;
/// use hue_switchboard::cache::{BridgeCache, StalenessPolicy};
/// use hue_switchboard::engine::MutationEngine;
/// use hue_switchboard::protocol::HttpClient;
/// use hue_switchboard::types::ControlPosition;
///
/// #[tokio::main]
/// async fn main() -> hue_switchboard::Result<()> {
///     let bridge = HttpClient::new("192.168.1.2", "application-key")?;
///     let mut cache = BridgeCache::open("cache.json", StalenessPolicy::default())?;
///     let mut engine = MutationEngine::new(&bridge, &mut cache);
///
///     let program = ButtonProgram::short(ButtonAction::scene_cycle(["scene-a", "scene-b"])?);
///     let outcome = engine
///         .apply("Office dimmer", ControlPosition::new(1)?, &program)
///         .await?;
///     println!("{} via {}", outcome.switch, outcome.strategy);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MutationEngine<'a, B> {
    bridge: &'a B,
    cache: &'a mut BridgeCache,
}

impl<'a, B: BridgeApi> MutationEngine<'a, B> {
    /// Creates an engine.
    pub fn new(bridge: &'a B, cache: &'a mut BridgeCache) -> Self {
        Self { bridge, cache }
    }

    /// Returns the cache.
    #[must_use]
    pub fn cache(&self) -> &BridgeCache {
        self.cache
    }

    /// Returns the bridge client.
    #[must_use]
    pub fn bridge(&self) -> &B {
        self.bridge
    }

    /// Reloads every cached collection from the bridge.
    ///
    /// # Errors
    ///
    /// Returns the error of the failed fetch or save; the previous cache is
    /// kept.
    pub async fn refresh_cache(&mut self) -> Result<()> {
        self.cache.refresh(self.bridge).await
    }

    // =========================================================================
    // Button programming
    // =========================================================================

    /// Resolves a switch by name after making sure the cache is fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::Lookup` if the name matches no or several switches, or
    /// the error of a failed refresh.
    pub async fn find_switch(&mut self, name: &str) -> Result<SwitchTarget> {
        self.cache.ensure_fresh(self.bridge).await?;
        Ok(resolve_switch(self.cache, name)?)
    }

    /// Programs one button of a named switch.
    ///
    /// # Errors
    ///
    /// - `Error::Lookup` if the switch name is not unique
    /// - `Error::Addressing` if the button cannot be located
    /// - `Error::Protocol` if the bridge rejected the change; the cache is
    ///   unchanged
    /// - `Error::PartialFailure` if the instance was deleted and could not be
    ///   recreated
    pub async fn apply(
        &mut self,
        switch_name: &str,
        position: ControlPosition,
        program: &ButtonProgram,
    ) -> Result<MutationOutcome> {
        let target = self.find_switch(switch_name).await?;
        self.apply_to(&target, position, program).await
    }

    /// Validates, resolves and applies a request expressed with names.
    ///
    /// Validation happens before the bridge is contacted.
    ///
    /// # Errors
    ///
    /// `Error::Validation` for an invalid request, otherwise as
    /// [`MutationEngine::apply`].
    pub async fn apply_request(
        &mut self,
        switch_name: &str,
        position: ControlPosition,
        request: &ProgramRequest,
    ) -> Result<MutationOutcome> {
        let intent = request.validate(position)?;
        let target = self.find_switch(switch_name).await?;
        let program = resolve_program(&intent, self.cache)?;
        self.apply_to(&target, position, &program).await
    }

    /// Programs one button of an already resolved switch.
    ///
    /// # Errors
    ///
    /// See [`MutationEngine::apply`].
    pub async fn apply_to(
        &mut self,
        target: &SwitchTarget,
        position: ControlPosition,
        program: &ButtonProgram,
    ) -> Result<MutationOutcome> {
        let lookup = ButtonLookup::from_records(self.cache.cached(Collection::Buttons));
        let mut configuration = target
            .instance
            .get("configuration")
            .cloned()
            .ok_or_else(|| ParseError::MissingField("configuration".to_string()))?;

        let slot = resolve_button_slot(&configuration, position, &lookup)?;
        let existing = slot
            .entry(&configuration)
            .and_then(ObservedAction::from_button);
        let strategy = decide_strategy(existing.as_ref(), program.kind());

        merge_program(&mut configuration, &slot, program)?;
        tracing::info!(
            switch = %target.name,
            button = %position,
            slot = %slot,
            %strategy,
            "Programming button"
        );

        match strategy {
            UpdateStrategy::InPlace => self.update_in_place(target, configuration).await,
            UpdateStrategy::Recreate => {
                self.recreate(&target.name, &target.instance, configuration)
                    .await
            }
        }
    }

    async fn update_in_place(
        &mut self,
        target: &SwitchTarget,
        configuration: Value,
    ) -> Result<MutationOutcome> {
        let body = InstanceUpdate {
            configuration,
            enabled: target
                .instance
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            metadata: target
                .instance
                .get("metadata")
                .cloned()
                .unwrap_or_else(|| json!({})),
        };
        let body = serde_json::to_value(&body).map_err(ParseError::from)?;

        self.bridge
            .put(ResourceType::BehaviorInstance, &target.instance_id, &body)
            .await?;

        let record =
            match fetch_record(self.bridge, ResourceType::BehaviorInstance, &target.instance_id)
                .await
            {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        instance = %target.instance_id,
                        error = %e,
                        "Could not read back updated instance, caching the merged document"
                    );
                    merged(&target.instance, &body)
                }
            };
        self.cache.upsert(Collection::Behaviours, record)?;

        tracing::info!(switch = %target.name, instance = %target.instance_id, "Instance updated");
        Ok(MutationOutcome {
            switch: target.name.clone(),
            strategy: UpdateStrategy::InPlace,
            previous_instance_id: target.instance_id.clone(),
            instance_id: target.instance_id.clone(),
        })
    }

    /// Replaces an instance with a new one carrying `configuration`.
    ///
    /// The current record is read from the bridge first for its script and
    /// metadata. Nothing is changed if that read or the delete fails.
    ///
    /// # Errors
    ///
    /// - `Error::Protocol` if the read or the delete failed
    /// - `Error::PartialFailure` if the create failed after the delete
    pub async fn replace_instance(
        &mut self,
        instance_id: &str,
        configuration: Value,
    ) -> Result<MutationOutcome> {
        let current = fetch_record(self.bridge, ResourceType::BehaviorInstance, instance_id).await?;
        let label = self.switch_label(&current);
        self.recreate(&label, &current, configuration).await
    }

    async fn recreate(
        &mut self,
        label: &str,
        previous: &Value,
        configuration: Value,
    ) -> Result<MutationOutcome> {
        let previous_id = record_id(previous)
            .ok_or_else(|| ParseError::MissingField("id".to_string()))?
            .to_string();
        let body = serde_json::to_value(InstanceCreate::replacing(previous, configuration))
            .map_err(ParseError::from)?;

        self.bridge
            .delete(ResourceType::BehaviorInstance, &previous_id)
            .await?;
        tracing::info!(switch = %label, instance = %previous_id, "Instance deleted");
        let mut cache_error = self
            .cache
            .evict(Collection::Behaviours, &previous_id)
            .err()
            .map(|e| {
                tracing::warn!(instance = %previous_id, error = %e, "Could not save cache after delete");
                Box::new(e)
            });

        let mut partial = |source: ProtocolError| {
            tracing::error!(
                switch = %label,
                instance = %previous_id,
                error = %source,
                "Instance deleted but recreation failed, switch is unprogrammed"
            );
            Error::PartialFailure {
                switch: label.to_string(),
                deleted_instance: previous_id.clone(),
                source: Box::new(source),
                cache_error: cache_error.take(),
            }
        };

        let refs = match self.bridge.post(ResourceType::BehaviorInstance, &body).await {
            Ok(refs) => refs,
            Err(e) => return Err(partial(e)),
        };
        let Some(new_id) = created_id(&refs) else {
            return Err(partial(ProtocolError::MalformedEnvelope(
                "create response carried no reference".to_string(),
            )));
        };

        let record = self.read_back(&new_id, &body).await;
        self.cache.upsert(Collection::Behaviours, record)?;

        tracing::info!(switch = %label, previous = %previous_id, instance = %new_id, "Instance recreated");
        Ok(MutationOutcome {
            switch: label.to_string(),
            strategy: UpdateStrategy::Recreate,
            previous_instance_id: previous_id,
            instance_id: new_id,
        })
    }

    /// Creates an instance from a complete body, for switches that have none.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the create.
    pub async fn create_instance(&mut self, body: &InstanceCreate) -> Result<String> {
        let body = serde_json::to_value(body).map_err(ParseError::from)?;
        let refs = self.bridge.post(ResourceType::BehaviorInstance, &body).await?;
        let new_id = created_id(&refs).ok_or_else(|| {
            ProtocolError::MalformedEnvelope("create response carried no reference".to_string())
        })?;

        let record = self.read_back(&new_id, &body).await;
        self.cache.upsert(Collection::Behaviours, record)?;
        tracing::info!(instance = %new_id, "Instance created");
        Ok(new_id)
    }

    async fn read_back(&self, id: &str, body: &Value) -> Value {
        match fetch_record(self.bridge, ResourceType::BehaviorInstance, id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(instance = %id, error = %e, "Could not read back created instance");
                let mut record = body.clone();
                if let Some(fields) = record.as_object_mut() {
                    fields.insert("id".to_string(), json!(id));
                    fields.insert("type".to_string(), json!(ResourceType::BehaviorInstance.path()));
                }
                record
            }
        }
    }

    fn switch_label(&self, instance: &Value) -> String {
        instance_device_id(instance)
            .and_then(|id| self.cache.find(Collection::Devices, id))
            .map_or_else(|| display_name(instance), display_name)
    }

    // =========================================================================
    // Switch initialisation
    // =========================================================================

    /// Collects what is needed to program a switch that has no behaviour
    /// instance yet.
    ///
    /// The device is matched by name among devices exposing button services;
    /// `scope` is resolved zone first, then room.
    ///
    /// # Errors
    ///
    /// - `Error::Lookup` if the device or scope name is not unique
    /// - `Error::Validation` if the device is already programmed
    pub async fn prepare_initial_switch(
        &mut self,
        device_name: &str,
        scope: &str,
    ) -> Result<InitialSwitch> {
        self.cache.ensure_fresh(self.bridge).await?;

        let devices: Vec<(&str, &str)> = self
            .cache
            .cached(Collection::Devices)
            .iter()
            .filter(|d| !button_services(d).is_empty())
            .filter_map(|d| Some((record_id(d)?, record_name(d)?)))
            .collect();
        let device_id = resolve_name("switch", device_name, &devices)?.to_string();

        let programmed = self
            .cache
            .cached(Collection::Behaviours)
            .iter()
            .any(|b| is_switch_instance(b) && instance_device_id(b) == Some(device_id.as_str()));
        if programmed {
            return Err(ValueError::Conflict(format!(
                "switch '{device_name}' already has a behaviour instance"
            ))
            .into());
        }

        let device = self
            .cache
            .find(Collection::Devices, &device_id)
            .cloned()
            .unwrap_or_default();
        let lookup = ButtonLookup::from_records(self.cache.cached(Collection::Buttons));
        let mut buttons = button_services(&device);
        buttons.sort_by_key(|rid| lookup.control_id(rid).unwrap_or(u16::MAX));

        Ok(InitialSwitch {
            device_id,
            name: display_name(&device),
            model_id: device
                .get("product_data")
                .and_then(|p| p.get("model_id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            buttons,
            scope: resolve_scope(self.cache, scope)?,
        })
    }

    /// Creates the first behaviour instance of a switch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the bridge rejected the create.
    pub async fn initialise_switch(&mut self, switch: &InitialSwitch) -> Result<String> {
        let body = build_initial_configuration(switch).map_err(ParseError::from)?;
        tracing::info!(switch = %switch.name, buttons = switch.buttons.len(), "Initialising switch");
        self.create_instance(&body).await
    }
}

/// Identifiers of the `button` services of a device.
fn button_services(device: &Value) -> Vec<String> {
    device
        .get("services")
        .and_then(Value::as_array)
        .map(|services| {
            services
                .iter()
                .filter(|s| s.get("rtype").and_then(Value::as_str) == Some("button"))
                .filter_map(|s| s.get("rid").and_then(Value::as_str).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// The cached instance with the fields of an update body applied.
fn merged(instance: &Value, body: &Value) -> Value {
    let mut record = instance.clone();
    if let (Some(target), Some(fields)) = (record.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    record
}
