// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writing the behaviour instances of a snapshot back to the bridge.

use serde_json::Value;

use super::Snapshot;
use crate::adapter::instance_device_id;
use crate::builder::InstanceCreate;
use crate::cache::{BridgeCache, Collection};
use crate::engine::MutationEngine;
use crate::error::{Error, ParseError, ProtocolError, Result};
use crate::protocol::BridgeApi;
use crate::types::{display_name, record_id};

/// One instance a restore would write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedInstance {
    /// Identifier recorded in the snapshot.
    pub saved_id: String,
    /// Instance display name.
    pub name: String,
    /// Instance the restore replaces: the saved one, or the instance that
    /// now programs the same switch after a recreate.
    pub current_id: Option<String>,
    /// Whether an instance will be replaced. Without one the saved record is
    /// created.
    pub exists: bool,
}

/// What a restore is about to do, shown to the user for confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    /// Room the snapshot was taken of.
    pub room_name: String,
    /// Capture time, RFC 3339.
    pub saved_at: String,
    /// Instances in snapshot order.
    pub instances: Vec<PlannedInstance>,
}

/// An instance written back by a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredInstance {
    /// Identifier recorded in the snapshot.
    pub saved_id: String,
    /// Identifier of the instance now on the bridge.
    pub instance_id: String,
}

/// An instance a restore could not write.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Identifier recorded in the snapshot.
    pub saved_id: String,
    /// Instance display name.
    pub name: String,
    /// What went wrong.
    pub error: Error,
}

/// Result of [`Restorer::restore`].
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Written instances.
    pub restored: Vec<RestoredInstance>,
    /// Instances left as they were, or left unprogrammed after a partial
    /// failure.
    pub failures: Vec<RestoreFailure>,
    /// The confirmation was declined and nothing was written.
    pub cancelled: bool,
}

impl RestoreReport {
    /// Returns `(succeeded, failed)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.restored.len(), self.failures.len())
    }

    /// Returns `true` if some instance was deleted and not recreated.
    #[must_use]
    pub fn has_partial_failure(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f.error, Error::PartialFailure { .. }))
    }
}

/// Replays the behaviour instances of a snapshot.
///
/// Each saved configuration replaces the whole instance through the
/// recreate path of [`MutationEngine`]. When the saved instance is gone, the
/// instance now attached to the same switch is replaced instead, so a switch
/// never ends up with two; only a switch with no instance at all gets one
/// created from the saved record. Failures are collected and the remaining
/// instances are still written. Nothing is retried.
///
/// # Examples
///
/// ```no_run
/// use hue_switchboard::cache::{BridgeCache, StalenessPolicy};
/// use hue_switchboard::engine::MutationEngine;
/// use hue_switchboard::protocol::HttpClient;
/// use hue_switchboard::snapshot::{Restorer, SnapshotStore};
///
/// #[tokio::main]
/// async fn main() -> hue_switchboard::Result<()> {
///     let store = SnapshotStore::new("snapshots");
///     let snapshot = store.load(store.latest_for("living")?)?;
///
///     let bridge = HttpClient::new("192.168.1.2", "application-key")?;
///     let mut cache = BridgeCache::open("cache.json", StalenessPolicy::default())?;
///     let mut engine = MutationEngine::new(&bridge, &mut cache);
///
///     let report = Restorer::new()
///         .restore(&mut engine, &snapshot, |plan| {
///             println!("restore {} instances of {}?", plan.instances.len(), plan.room_name);
///             true
///         })
///         .await;
///     let (ok, failed) = report.counts();
///     println!("{ok} restored, {failed} failed");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Restorer {
    skip_confirmation: bool,
}

impl Restorer {
    /// Creates a restorer that asks for confirmation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes without calling the confirmation callback.
    #[must_use]
    pub fn with_confirmation_skipped(mut self, skip: bool) -> Self {
        self.skip_confirmation = skip;
        self
    }

    /// Lists what [`Self::restore`] would write.
    #[must_use]
    pub fn plan<B: BridgeApi>(snapshot: &Snapshot, engine: &MutationEngine<'_, B>) -> RestorePlan {
        let instances = snapshot
            .behaviours
            .iter()
            .map(|saved| {
                let saved_id = record_id(saved).unwrap_or_default().to_string();
                let current_id = current_instance(engine.cache(), saved);
                PlannedInstance {
                    saved_id,
                    name: display_name(saved),
                    exists: current_id.is_some(),
                    current_id,
                }
            })
            .collect();
        RestorePlan {
            room_name: snapshot.room_name().to_string(),
            saved_at: snapshot.saved_at.to_rfc3339(),
            instances,
        }
    }

    /// Writes every behaviour instance of `snapshot` to the bridge.
    ///
    /// `confirm` receives the plan before any write and may decline; it is
    /// not called when confirmation is skipped.
    pub async fn restore<B: BridgeApi>(
        &self,
        engine: &mut MutationEngine<'_, B>,
        snapshot: &Snapshot,
        confirm: impl FnOnce(&RestorePlan) -> bool,
    ) -> RestoreReport {
        let plan = Self::plan(snapshot, engine);
        if !self.skip_confirmation && !confirm(&plan) {
            tracing::info!(room = %plan.room_name, "Restore cancelled");
            return RestoreReport {
                cancelled: true,
                ..RestoreReport::default()
            };
        }

        tracing::info!(
            room = %plan.room_name,
            saved_at = %plan.saved_at,
            instances = plan.instances.len(),
            "Restoring snapshot"
        );

        let mut report = RestoreReport::default();
        for (saved, planned) in snapshot.behaviours.iter().zip(plan.instances) {
            match restore_one(engine, saved, &planned.saved_id).await {
                Ok(instance_id) => report.restored.push(RestoredInstance {
                    saved_id: planned.saved_id,
                    instance_id,
                }),
                Err(error) => {
                    tracing::warn!(instance = %planned.saved_id, %error, "Instance not restored");
                    report.failures.push(RestoreFailure {
                        saved_id: planned.saved_id,
                        name: planned.name,
                        error,
                    });
                }
            }
        }

        let (ok, failed) = report.counts();
        if failed == 0 {
            tracing::info!(room = %plan.room_name, restored = ok, "Restore complete");
        } else {
            tracing::error!(room = %plan.room_name, restored = ok, failed, "Restore incomplete");
        }
        report
    }
}

async fn restore_one<B: BridgeApi>(
    engine: &mut MutationEngine<'_, B>,
    saved: &Value,
    saved_id: &str,
) -> Result<String> {
    let configuration = saved
        .get("configuration")
        .cloned()
        .ok_or_else(|| ParseError::MissingField("configuration".to_string()))?;
    if saved_id.is_empty() {
        return Err(ParseError::MissingField("id".to_string()).into());
    }

    let target = current_instance(engine.cache(), saved).unwrap_or_else(|| saved_id.to_string());
    match engine.replace_instance(&target, configuration.clone()).await {
        Ok(outcome) => return Ok(outcome.instance_id),
        Err(Error::Protocol(ProtocolError::ResourceNotFound { .. })) => {}
        Err(e) => return Err(e),
    }

    // The cache was behind the bridge. Look the switch up on fresh data.
    engine.refresh_cache().await?;
    if let Some(successor) = current_instance(engine.cache(), saved).filter(|id| *id != target) {
        tracing::debug!(instance = %saved_id, current = %successor, "Replacing the switch's current instance");
        return engine
            .replace_instance(&successor, configuration)
            .await
            .map(|outcome| outcome.instance_id);
    }

    tracing::debug!(instance = %saved_id, "Instance gone, creating it");
    engine
        .create_instance(&InstanceCreate::replacing(saved, configuration))
        .await
}

/// Finds the cached instance a saved record should replace: the same id, or
/// else the instance programming the same device.
fn current_instance(cache: &BridgeCache, saved: &Value) -> Option<String> {
    let saved_id = record_id(saved)?;
    if cache.find(Collection::Behaviours, saved_id).is_some() {
        return Some(saved_id.to_string());
    }
    let device = instance_device_id(saved)?;
    cache
        .cached(Collection::Behaviours)
        .iter()
        .find(|record| instance_device_id(record) == Some(device))
        .and_then(record_id)
        .map(str::to_string)
}
