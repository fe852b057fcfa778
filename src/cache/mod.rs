// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Write-through cache of bridge collections.
//!
//! [`BridgeCache`] mirrors the bridge collections the library reads (lights,
//! rooms, zones, scenes, devices, buttons, behaviour instances, device power)
//! under a single `last_updated` timestamp.
//!
//! - **Reads** go through [`BridgeCache::get`]. A stale cache is refreshed as
//!   a whole before the read; collections are never refreshed one by one.
//! - **Writes** ([`BridgeCache::upsert`], [`BridgeCache::remove`]) are made
//!   only after a remote mutation succeeded. Each write saves the complete
//!   document and updates memory only once the save succeeded.
//!
//! A cache handle is passed explicitly to whatever needs it; there is no
//! global cache.

mod policy;
mod store;

pub use policy::{CacheInfo, StalenessPolicy};
pub use store::CacheStore;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CacheError, Error, Result};
use crate::protocol::BridgeApi;
use crate::types::{ResourceType, record_id};

/// A cached bridge collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Lights.
    Lights,
    /// Rooms.
    Rooms,
    /// Zones.
    Zones,
    /// Scenes.
    Scenes,
    /// Devices.
    Devices,
    /// Button services.
    Buttons,
    /// Behaviour instances.
    Behaviours,
    /// Device power (battery) records.
    DevicePower,
}

impl Collection {
    /// Every collection, in refresh order.
    pub const ALL: [Self; 8] = [
        Self::Lights,
        Self::Rooms,
        Self::Zones,
        Self::Scenes,
        Self::Devices,
        Self::Buttons,
        Self::Behaviours,
        Self::DevicePower,
    ];

    /// Returns the bridge resource type backing this collection.
    #[must_use]
    pub const fn resource_type(self) -> ResourceType {
        match self {
            Self::Lights => ResourceType::Light,
            Self::Rooms => ResourceType::Room,
            Self::Zones => ResourceType::Zone,
            Self::Scenes => ResourceType::Scene,
            Self::Devices => ResourceType::Device,
            Self::Buttons => ResourceType::Button,
            Self::Behaviours => ResourceType::BehaviorInstance,
            Self::DevicePower => ResourceType::DevicePower,
        }
    }

    /// Returns the key used in the cache document.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Lights => "lights",
            Self::Rooms => "rooms",
            Self::Zones => "zones",
            Self::Scenes => "scenes",
            Self::Devices => "devices",
            Self::Buttons => "buttons",
            Self::Behaviours => "behaviours",
            Self::DevicePower => "device_power",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The persisted cache document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheDocument {
    /// Time of the last full refresh.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Lights.
    #[serde(default)]
    pub lights: Vec<Value>,
    /// Rooms.
    #[serde(default)]
    pub rooms: Vec<Value>,
    /// Zones.
    #[serde(default)]
    pub zones: Vec<Value>,
    /// Scenes.
    #[serde(default)]
    pub scenes: Vec<Value>,
    /// Devices.
    #[serde(default)]
    pub devices: Vec<Value>,
    /// Button services.
    #[serde(default)]
    pub buttons: Vec<Value>,
    /// Behaviour instances.
    #[serde(default)]
    pub behaviours: Vec<Value>,
    /// Device power records.
    #[serde(default)]
    pub device_power: Vec<Value>,
    /// Local button shortcuts, keyed `"<switch-id>:<event-code>"`, mapping
    /// to a scene identifier.
    #[serde(default)]
    pub button_mappings: BTreeMap<String, String>,
}

impl CacheDocument {
    /// Returns a collection.
    #[must_use]
    pub fn collection(&self, collection: Collection) -> &[Value] {
        match collection {
            Collection::Lights => &self.lights,
            Collection::Rooms => &self.rooms,
            Collection::Zones => &self.zones,
            Collection::Scenes => &self.scenes,
            Collection::Devices => &self.devices,
            Collection::Buttons => &self.buttons,
            Collection::Behaviours => &self.behaviours,
            Collection::DevicePower => &self.device_power,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Lights => &mut self.lights,
            Collection::Rooms => &mut self.rooms,
            Collection::Zones => &mut self.zones,
            Collection::Scenes => &mut self.scenes,
            Collection::Devices => &mut self.devices,
            Collection::Buttons => &mut self.buttons,
            Collection::Behaviours => &mut self.behaviours,
            Collection::DevicePower => &mut self.device_power,
        }
    }

    /// Replaces the record whose `id` matches, or appends it.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingField` if the record has no `id`.
    pub fn upsert(
        &mut self,
        collection: Collection,
        record: Value,
    ) -> std::result::Result<(), crate::error::ParseError> {
        let id = record_id(&record)
            .ok_or_else(|| crate::error::ParseError::MissingField("id".to_string()))?
            .to_string();
        let items = self.collection_mut(collection);
        match items.iter_mut().find(|r| record_id(r) == Some(id.as_str())) {
            Some(existing) => *existing = record,
            None => items.push(record),
        }
        Ok(())
    }

    /// Removes the record whose `id` matches. Returns `false` if absent.
    pub fn remove(&mut self, collection: Collection, id: &str) -> bool {
        let items = self.collection_mut(collection);
        let before = items.len();
        items.retain(|r| record_id(r) != Some(id));
        items.len() != before
    }
}

/// Builds a button-mapping key.
#[must_use]
pub fn mapping_key(switch_id: &str, event_code: u32) -> String {
    format!("{switch_id}:{event_code}")
}

/// Local mirror of bridge collections with write-through updates.
///
/// # Examples
///
/// ```
/// use hue_switchboard::cache::{BridgeCache, Collection, StalenessPolicy};
/// use hue_switchboard::protocol::MemoryBridge;
/// use hue_switchboard::types::ResourceType;
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> hue_switchboard::Result<()> {
/// let bridge = MemoryBridge::new()
///     .with_record(ResourceType::Scene, json!({"id": "s1", "metadata": {"name": "Relax"}}));
///
/// let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
/// let scenes = cache.get(&bridge, Collection::Scenes).await?;
/// assert_eq!(scenes.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BridgeCache {
    store: Option<CacheStore>,
    policy: StalenessPolicy,
    document: Option<CacheDocument>,
}

impl BridgeCache {
    /// Creates a cache that lives only in memory.
    #[must_use]
    pub fn in_memory(policy: StalenessPolicy) -> Self {
        Self {
            store: None,
            policy,
            document: None,
        }
    }

    /// Opens the cache file at `path`.
    ///
    /// A missing file yields an empty cache. A file that cannot be decoded is
    /// logged and treated as missing; the next refresh overwrites it.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>, policy: StalenessPolicy) -> Result<Self> {
        let store = CacheStore::new(path);
        let document = match store.load() {
            Ok(document) => document,
            Err(CacheError::Corrupt(e)) => {
                tracing::warn!(path = %store.path().display(), error = %e, "Ignoring unreadable cache file");
                None
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            store: Some(store),
            policy,
            document,
        })
    }

    /// Creates a cache from an existing document, without a backing file.
    #[must_use]
    pub fn from_document(document: CacheDocument, policy: StalenessPolicy) -> Self {
        Self {
            store: None,
            policy,
            document: Some(document),
        }
    }

    /// Returns the current document, if any.
    #[must_use]
    pub fn document(&self) -> Option<&CacheDocument> {
        self.document.as_ref()
    }

    /// Returns the staleness policy.
    #[must_use]
    pub fn policy(&self) -> StalenessPolicy {
        self.policy
    }

    /// Returns `true` if the cache must be refreshed before it is read.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    /// Staleness at a given instant.
    #[must_use]
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.policy
            .is_stale(self.document.as_ref().and_then(|d| d.last_updated), now)
    }

    /// Returns a collection, refreshing the whole cache first if it is stale.
    ///
    /// # Errors
    ///
    /// - `CacheError::Unavailable` if there is no cache and the refresh failed
    /// - `Error::Protocol` if a stale cache could not be refreshed
    /// - `CacheError::Io` if the refreshed cache could not be saved
    pub async fn get<B: BridgeApi>(
        &mut self,
        bridge: &B,
        collection: Collection,
    ) -> Result<&[Value]> {
        self.ensure_fresh(bridge).await?;
        Ok(self
            .document
            .as_ref()
            .map(|d| d.collection(collection))
            .unwrap_or_default())
    }

    /// Returns a collection without checking staleness.
    #[must_use]
    pub fn cached(&self, collection: Collection) -> &[Value] {
        self.document
            .as_ref()
            .map(|d| d.collection(collection))
            .unwrap_or_default()
    }

    /// Returns one cached record by identifier.
    #[must_use]
    pub fn find(&self, collection: Collection, id: &str) -> Option<&Value> {
        self.cached(collection)
            .iter()
            .find(|r| record_id(r) == Some(id))
    }

    /// Refreshes the cache if it is stale.
    ///
    /// # Errors
    ///
    /// See [`BridgeCache::get`].
    pub async fn ensure_fresh<B: BridgeApi>(&mut self, bridge: &B) -> Result<()> {
        if self.is_stale() {
            tracing::info!(
                last_updated = ?self.document.as_ref().and_then(|d| d.last_updated),
                "Cache is stale, refreshing"
            );
            self.refresh(bridge).await?;
        }
        Ok(())
    }

    /// Fetches every collection and replaces the cache in one save.
    ///
    /// Nothing changes unless all collections were fetched and the document
    /// was saved. Local button mappings are kept.
    ///
    /// # Errors
    ///
    /// See [`BridgeCache::get`].
    pub async fn refresh<B: BridgeApi>(&mut self, bridge: &B) -> Result<()> {
        let mut fresh = CacheDocument {
            button_mappings: self
                .document
                .as_ref()
                .map(|d| d.button_mappings.clone())
                .unwrap_or_default(),
            ..CacheDocument::default()
        };

        for collection in Collection::ALL {
            match bridge.get(collection.resource_type(), None).await {
                Ok(records) => *fresh.collection_mut(collection) = records,
                Err(e) if self.document.is_none() => {
                    return Err(CacheError::Unavailable(Box::new(e)).into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        fresh.last_updated = Some(Utc::now());

        self.commit(fresh)?;
        tracing::info!(
            lights = self.cached(Collection::Lights).len(),
            scenes = self.cached(Collection::Scenes).len(),
            behaviours = self.cached(Collection::Behaviours).len(),
            "Cache refreshed"
        );
        Ok(())
    }

    /// Replaces or appends a record after a successful remote mutation.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MissingField` for a record without `id`, or
    /// `CacheError::Io` if the document could not be saved.
    pub fn upsert(&mut self, collection: Collection, record: Value) -> Result<()> {
        let mut next = self.document.clone().unwrap_or_default();
        next.upsert(collection, record)?;
        self.commit(next)
    }

    /// Removes a record after a successful remote deletion. Removing an
    /// absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the document could not be saved.
    pub fn remove(&mut self, collection: Collection, id: &str) -> Result<()> {
        let Some(current) = &self.document else {
            return Ok(());
        };
        let mut next = current.clone();
        if !next.remove(collection, id) {
            return Ok(());
        }
        self.commit(next)
    }

    /// Removes a record after a successful remote deletion, keeping the
    /// in-memory document current even when the save fails.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the document could not be saved. The
    /// record is gone from memory regardless and the next successful save
    /// persists the removal.
    pub fn evict(&mut self, collection: Collection, id: &str) -> Result<()> {
        let Some(document) = self.document.as_mut() else {
            return Ok(());
        };
        if !document.remove(collection, id) {
            return Ok(());
        }
        match &self.store {
            Some(store) => store.save(document).map_err(Error::from),
            None => Ok(()),
        }
    }

    /// Returns the scene mapped to a button event, if any.
    #[must_use]
    pub fn button_mapping(&self, switch_id: &str, event_code: u32) -> Option<&str> {
        self.document
            .as_ref()?
            .button_mappings
            .get(&mapping_key(switch_id, event_code))
            .map(String::as_str)
    }

    /// Returns every local button mapping.
    #[must_use]
    pub fn button_mappings(&self) -> BTreeMap<String, String> {
        self.document
            .as_ref()
            .map(|d| d.button_mappings.clone())
            .unwrap_or_default()
    }

    /// Maps a button event to a scene.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the document could not be saved.
    pub fn set_button_mapping(
        &mut self,
        switch_id: &str,
        event_code: u32,
        scene_id: impl Into<String>,
    ) -> Result<()> {
        let mut next = self.document.clone().unwrap_or_default();
        next.button_mappings
            .insert(mapping_key(switch_id, event_code), scene_id.into());
        self.commit(next)
    }

    /// Removes a button mapping. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the document could not be saved.
    pub fn remove_button_mapping(&mut self, switch_id: &str, event_code: u32) -> Result<bool> {
        let Some(current) = &self.document else {
            return Ok(false);
        };
        let mut next = current.clone();
        if next
            .button_mappings
            .remove(&mapping_key(switch_id, event_code))
            .is_none()
        {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Describes the cache.
    #[must_use]
    pub fn info(&self) -> CacheInfo {
        let now = Utc::now();
        let last_updated = self.document.as_ref().and_then(|d| d.last_updated);
        #[allow(clippy::cast_precision_loss)]
        let age_hours = last_updated.map(|at| (now - at).num_seconds() as f64 / 3600.0);
        CacheInfo {
            exists: self.document.is_some(),
            last_updated,
            age_hours,
            stale: self.is_stale_at(now),
            counts: Collection::ALL
                .iter()
                .map(|&c| (c.key(), self.cached(c).len()))
                .collect(),
            button_mappings: self
                .document
                .as_ref()
                .map_or(0, |d| d.button_mappings.len()),
        }
    }

    fn commit(&mut self, next: CacheDocument) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&next).map_err(Error::from)?;
        }
        self.document = Some(next);
        Ok(())
    }
}
