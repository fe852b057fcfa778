// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Switch lookup by device name.

use serde_json::Value;

use super::resolve_name;
use crate::adapter::{instance_device_id, is_switch_instance};
use crate::cache::{BridgeCache, Collection};
use crate::error::LookupError;
use crate::types::{display_name, record_id};

/// A switch together with the behaviour instance that programs it.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchTarget {
    /// Device display name.
    pub name: String,
    /// Device identifier.
    pub device_id: String,
    /// Behaviour instance identifier.
    pub instance_id: String,
    /// The cached behaviour instance.
    pub instance: Value,
}

/// Lists `(instance id, device name)` for every programmable switch.
///
/// Only behaviour instances carrying button entries (either addressing shape)
/// whose device is cached are listed.
#[must_use]
pub fn switch_names(cache: &BridgeCache) -> Vec<(String, String)> {
    cache
        .cached(Collection::Behaviours)
        .iter()
        .filter(|instance| is_switch_instance(instance))
        .filter_map(|instance| {
            let device = cache.find(Collection::Devices, instance_device_id(instance)?)?;
            Some((record_id(instance)?.to_string(), display_name(device)))
        })
        .collect()
}

/// Resolves a switch by name.
///
/// # Errors
///
/// Returns `LookupError::NotFound` or `LookupError::Ambiguous` as described
/// for [`resolve_name`].
pub fn resolve_switch(cache: &BridgeCache, name: &str) -> Result<SwitchTarget, LookupError> {
    let switches = switch_names(cache);
    let candidates: Vec<(&str, &str)> = switches
        .iter()
        .map(|(id, name)| (id.as_str(), name.as_str()))
        .collect();

    let instance_id = resolve_name("switch", name, &candidates)?;
    let instance = cache
        .find(Collection::Behaviours, instance_id)
        .cloned()
        .unwrap_or_default();
    let device_id = instance_device_id(&instance).unwrap_or_default().to_string();
    let name = switches
        .iter()
        .find(|(id, _)| id == instance_id)
        .map(|(_, n)| n.clone())
        .unwrap_or_default();

    Ok(SwitchTarget {
        name,
        device_id,
        instance_id: instance_id.to_string(),
        instance,
    })
}
