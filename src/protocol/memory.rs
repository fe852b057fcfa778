// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process bridge.
//!
//! [`MemoryBridge`] keeps resources in memory and answers like a real bridge:
//! writes return `{rid, rtype}` references, missing records are reported as
//! not found, and a partial update of a behaviour instance that would change
//! a button's action kind is rejected. Failures can be scheduled per method
//! and resource type to exercise error paths.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::action::ObservedAction;
use crate::adapter::{ButtonLookup, button_entries};
use crate::error::ProtocolError;
use crate::protocol::BridgeApi;
use crate::types::{ResourceType, record_id};

/// Request method, used to record calls and schedule failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read.
    Get,
    /// Update.
    Put,
    /// Create.
    Post,
    /// Delete.
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Default)]
struct State {
    resources: HashMap<ResourceType, Vec<Value>>,
    failures: Vec<(Method, ResourceType)>,
    calls: Vec<(Method, ResourceType, Option<String>)>,
}

impl State {
    fn take_failure(&mut self, method: Method, resource: ResourceType) -> Option<ProtocolError> {
        let index = self
            .failures
            .iter()
            .position(|&(m, r)| m == method && r == resource)?;
        self.failures.remove(index);
        Some(ProtocolError::Api {
            status: 503,
            body: format!("{{\"errors\":[{{\"description\":\"injected {method} failure\"}}]}}"),
        })
    }

    fn collection(&mut self, resource: ResourceType) -> &mut Vec<Value> {
        self.resources.entry(resource).or_default()
    }
}

/// An in-memory [`BridgeApi`] implementation.
///
/// Clones share the same state.
///
/// # Examples
///
/// ```
/// use hue_switchboard::protocol::{BridgeApi, MemoryBridge};
/// use hue_switchboard::types::ResourceType;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bridge = MemoryBridge::new()
///     .with_record(ResourceType::Scene, json!({"id": "s1", "metadata": {"name": "Relax"}}));
///
/// let scenes = bridge.get(ResourceType::Scene, None).await.unwrap();
/// assert_eq!(scenes.len(), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBridge {
    state: Arc<Mutex<State>>,
}

impl MemoryBridge {
    /// Creates an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record, builder style.
    #[must_use]
    pub fn with_record(self, resource: ResourceType, record: Value) -> Self {
        self.insert(resource, record);
        self
    }

    /// Adds or replaces a record, matched by `id`.
    pub fn insert(&self, resource: ResourceType, record: Value) {
        let mut state = self.state.lock();
        let collection = state.collection(resource);
        let id = record_id(&record).map(str::to_string);
        match collection
            .iter_mut()
            .find(|r| id.is_some() && record_id(r) == id.as_deref())
        {
            Some(existing) => *existing = record,
            None => collection.push(record),
        }
    }

    /// Returns a copy of a collection.
    #[must_use]
    pub fn records(&self, resource: ResourceType) -> Vec<Value> {
        self.state
            .lock()
            .resources
            .get(&resource)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns a copy of one record.
    #[must_use]
    pub fn record(&self, resource: ResourceType, id: &str) -> Option<Value> {
        self.records(resource)
            .into_iter()
            .find(|r| record_id(r) == Some(id))
    }

    /// Makes the next `method` request on `resource` fail with HTTP 503.
    ///
    /// Several failures can be queued; each is consumed by one request.
    pub fn fail_next(&self, method: Method, resource: ResourceType) {
        self.state.lock().failures.push((method, resource));
    }

    /// Returns every request received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<(Method, ResourceType, Option<String>)> {
        self.state.lock().calls.clone()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn begin(
        &self,
        method: Method,
        resource: ResourceType,
        id: Option<&str>,
    ) -> Result<parking_lot::MutexGuard<'_, State>, ProtocolError> {
        let mut state = self.state.lock();
        state.calls.push((method, resource, id.map(str::to_string)));
        match state.take_failure(method, resource) {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }

    fn not_found(resource: ResourceType, id: &str) -> ProtocolError {
        ProtocolError::ResourceNotFound {
            resource: resource.path().to_string(),
            id: id.to_string(),
        }
    }

    fn reference(resource: ResourceType, id: &str) -> Value {
        json!({"rid": id, "rtype": resource.path()})
    }
}

/// Returns the first button whose short-press kind differs between two
/// configurations.
fn changed_kind(old: &Value, new: &Value) -> Option<String> {
    let lookup = ButtonLookup::default();
    let before: HashMap<_, _> = button_entries(old, &lookup)
        .into_iter()
        .filter_map(|e| Some((e.key, ObservedAction::from_button(e.entry)?.kind()?)))
        .collect();

    button_entries(new, &lookup).into_iter().find_map(|e| {
        let kind = ObservedAction::from_button(e.entry)?.kind()?;
        match before.get(&e.key) {
            Some(previous) if *previous != kind => Some(e.key.to_string()),
            _ => None,
        }
    })
}

impl BridgeApi for MemoryBridge {
    async fn get(
        &self,
        resource: ResourceType,
        id: Option<&str>,
    ) -> Result<Vec<Value>, ProtocolError> {
        let mut state = self.begin(Method::Get, resource, id)?;
        let collection = state.collection(resource);
        match id {
            None => Ok(collection.clone()),
            Some(id) => collection
                .iter()
                .find(|r| record_id(r) == Some(id))
                .map(|r| vec![r.clone()])
                .ok_or_else(|| Self::not_found(resource, id)),
        }
    }

    async fn put(
        &self,
        resource: ResourceType,
        id: &str,
        body: &Value,
    ) -> Result<Vec<Value>, ProtocolError> {
        let mut state = self.begin(Method::Put, resource, Some(id))?;
        let record = state
            .collection(resource)
            .iter_mut()
            .find(|r| record_id(r) == Some(id))
            .ok_or_else(|| Self::not_found(resource, id))?;

        if resource == ResourceType::BehaviorInstance {
            if let (Some(old), Some(new)) = (record.get("configuration"), body.get("configuration"))
            {
                if let Some(button) = changed_kind(old, new) {
                    return Err(ProtocolError::Api {
                        status: 400,
                        body: format!(
                            "{{\"errors\":[{{\"description\":\"cannot change action type of {button}\"}}]}}"
                        ),
                    });
                }
            }
        }

        if let (Some(target), Some(patch)) = (record.as_object_mut(), body.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(vec![Self::reference(resource, id)])
    }

    async fn post(
        &self,
        resource: ResourceType,
        body: &Value,
    ) -> Result<Vec<Value>, ProtocolError> {
        let mut state = self.begin(Method::Post, resource, None)?;
        let id = Uuid::new_v4().to_string();

        let mut record = Map::new();
        record.insert("id".to_string(), json!(id));
        record.insert("type".to_string(), json!(resource.path()));
        if resource == ResourceType::BehaviorInstance {
            record.insert("status".to_string(), json!("running"));
        }
        if let Some(fields) = body.as_object() {
            for (key, value) in fields {
                record.insert(key.clone(), value.clone());
            }
        }
        state.collection(resource).push(Value::Object(record));

        Ok(vec![Self::reference(resource, &id)])
    }

    async fn delete(&self, resource: ResourceType, id: &str) -> Result<bool, ProtocolError> {
        let mut state = self.begin(Method::Delete, resource, Some(id))?;
        let collection = state.collection(resource);
        let before = collection.len();
        collection.retain(|r| record_id(r) != Some(id));
        if collection.len() == before {
            return Err(Self::not_found(resource, id));
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_button() -> Value {
        json!({"on_short_release": {"scene_cycle_extended": {"slots": []}}})
    }

    #[tokio::test]
    async fn post_then_get() {
        let bridge = MemoryBridge::new();
        let refs = bridge
            .post(ResourceType::Scene, &json!({"metadata": {"name": "New"}}))
            .await
            .unwrap();
        let id = refs[0]["rid"].as_str().unwrap().to_string();

        let record = bridge.get(ResourceType::Scene, Some(&id)).await.unwrap();
        assert_eq!(record[0]["metadata"]["name"], "New");
        assert_eq!(record[0]["type"], "scene");
    }

    #[tokio::test]
    async fn missing_records_not_found() {
        let bridge = MemoryBridge::new();
        assert!(matches!(
            bridge.get(ResourceType::Light, Some("x")).await,
            Err(ProtocolError::ResourceNotFound { .. })
        ));
        assert!(matches!(
            bridge.delete(ResourceType::Light, "x").await,
            Err(ProtocolError::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn injected_failure_consumed_once() {
        let bridge = MemoryBridge::new();
        bridge.fail_next(Method::Get, ResourceType::Room);
        assert!(bridge.get(ResourceType::Room, None).await.is_err());
        assert!(bridge.get(ResourceType::Room, None).await.is_ok());
        assert_eq!(bridge.calls().len(), 2);
    }

    #[tokio::test]
    async fn put_rejects_kind_change() {
        let bridge = MemoryBridge::new().with_record(
            ResourceType::BehaviorInstance,
            json!({"id": "b1", "configuration": {"button1": cycle_button()}}),
        );

        let dim = json!({"configuration": {"button1": {"on_short_release": {"action": "dim_up"}}}});
        let err = bridge
            .put(ResourceType::BehaviorInstance, "b1", &dim)
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Api { status: 400, .. }));

        let same_kind = json!({"configuration": {"button1": cycle_button(), "button2": {}}});
        assert!(
            bridge
                .put(ResourceType::BehaviorInstance, "b1", &same_kind)
                .await
                .is_ok()
        );
    }

    #[test]
    fn insert_replaces_by_id() {
        let bridge = MemoryBridge::new();
        bridge.insert(ResourceType::Light, json!({"id": "l1", "on": {"on": false}}));
        bridge.insert(ResourceType::Light, json!({"id": "l1", "on": {"on": true}}));
        assert_eq!(bridge.records(ResourceType::Light).len(), 1);
        assert_eq!(
            bridge.record(ResourceType::Light, "l1").unwrap()["on"]["on"],
            true
        );
    }
}
