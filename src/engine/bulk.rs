// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reprogramming several buttons of one switch at once.

use crate::action::ButtonProgram;
use crate::adapter::{ButtonLookup, resolve_button_slot};
use crate::cache::Collection;
use crate::error::{Error, ParseError, Result};
use crate::protocol::BridgeApi;
use crate::resolve::SwitchTarget;
use crate::types::ControlPosition;

use super::{MutationEngine, MutationOutcome, merge_program};

/// A button that could not be reprogrammed.
#[derive(Debug)]
pub struct ButtonFailure {
    /// Button position.
    pub position: ControlPosition,
    /// Why it was skipped.
    pub error: Error,
}

/// Result of [`MutationEngine::reprogram_buttons`].
#[derive(Debug, Default)]
pub struct BulkReport {
    /// Buttons written to the bridge, in request order.
    pub programmed: Vec<ControlPosition>,
    /// Buttons left as they were.
    pub failed: Vec<ButtonFailure>,
    /// The recreate that carried the change, if any button was programmed.
    pub outcome: Option<MutationOutcome>,
}

impl BulkReport {
    /// Returns `true` if every requested button was programmed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.programmed.is_empty()
    }
}

impl<B: BridgeApi> MutationEngine<'_, B> {
    /// Reprograms several buttons of one switch with a single recreate.
    ///
    /// Buttons are merged in request order. A button whose slot cannot be
    /// located is reported in [`BulkReport::failed`] and the rest are still
    /// written. Because the change may convert several action kinds at once
    /// the instance is always deleted and recreated.
    ///
    /// # Errors
    ///
    /// - `Error::Lookup` if the switch name is not unique
    /// - `Error::Protocol` if the bridge rejected the read or the delete
    /// - `Error::PartialFailure` if the create failed after the delete
    pub async fn reprogram_buttons(
        &mut self,
        switch_name: &str,
        programs: &[(ControlPosition, ButtonProgram)],
    ) -> Result<BulkReport> {
        let target = self.find_switch(switch_name).await?;
        self.reprogram_target(&target, programs, BulkReport::default())
            .await
    }

    /// Merges `programs` into a resolved switch and recreates it once.
    /// Failures already in `report` are kept.
    pub(super) async fn reprogram_target(
        &mut self,
        target: &SwitchTarget,
        programs: &[(ControlPosition, ButtonProgram)],
        mut report: BulkReport,
    ) -> Result<BulkReport> {
        let lookup = ButtonLookup::from_records(self.cache.cached(Collection::Buttons));
        let mut configuration = target
            .instance
            .get("configuration")
            .cloned()
            .ok_or_else(|| ParseError::MissingField("configuration".to_string()))?;

        for (position, program) in programs {
            let merged = resolve_button_slot(&configuration, *position, &lookup)
                .map_err(Error::from)
                .and_then(|slot| Ok(merge_program(&mut configuration, &slot, program)?));
            match merged {
                Ok(()) => report.programmed.push(*position),
                Err(error) => {
                    tracing::warn!(switch = %target.name, button = %position, %error, "Skipping button");
                    report.failed.push(ButtonFailure {
                        position: *position,
                        error,
                    });
                }
            }
        }

        if report.programmed.is_empty() {
            tracing::warn!(switch = %target.name, "No button could be reprogrammed");
            return Ok(report);
        }

        tracing::info!(
            switch = %target.name,
            buttons = report.programmed.len(),
            skipped = report.failed.len(),
            "Reprogramming buttons"
        );
        report.outcome = Some(
            self.recreate(&target.name, &target.instance, configuration)
                .await?,
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ButtonAction, DimDirection, ObservedAction};
    use crate::adapter::SlotKey;
    use crate::cache::{BridgeCache, CacheDocument, StalenessPolicy};
    use crate::engine::UpdateStrategy;
    use crate::error::AddressingError;
    use crate::protocol::{MemoryBridge, Method};
    use crate::types::ResourceType;
    use chrono::Utc;
    use serde_json::json;

    fn setup() -> (MemoryBridge, BridgeCache) {
        let bridge = MemoryBridge::new()
            .with_record(
                ResourceType::BehaviorInstance,
                json!({
                    "id": "inst-1",
                    "script_id": "script-x",
                    "metadata": {"name": "Lounge"},
                    "configuration": {
                        "device": {"rid": "dev-1"},
                        "buttons": {
                            "btn-1": {"on_short_release": {"action": "dim_up"}},
                            "btn-2": {"on_short_release": {"action": "dim_down"}}
                        }
                    }
                }),
            )
            .with_record(
                ResourceType::Device,
                json!({"id": "dev-1", "metadata": {"name": "Lounge switch"}}),
            );
        let document = CacheDocument {
            last_updated: Some(Utc::now()),
            devices: bridge.records(ResourceType::Device),
            behaviours: bridge.records(ResourceType::BehaviorInstance),
            buttons: vec![
                json!({"id": "btn-1", "metadata": {"control_id": 1}}),
                json!({"id": "btn-2", "metadata": {"control_id": 2}}),
            ],
            ..CacheDocument::default()
        };
        (
            bridge,
            BridgeCache::from_document(document, StalenessPolicy::default()),
        )
    }

    #[tokio::test]
    async fn reports_programmed_and_skipped_buttons() {
        let (bridge, mut cache) = setup();
        let programs = vec![
            (
                ControlPosition::new(1).unwrap(),
                ButtonProgram::short(ButtonAction::scene_cycle(["s-a", "s-b"]).unwrap()),
            ),
            (
                ControlPosition::new(4).unwrap(),
                ButtonProgram::short(ButtonAction::dimming(DimDirection::Up)),
            ),
        ];

        let report = MutationEngine::new(&bridge, &mut cache)
            .reprogram_buttons("lounge", &programs)
            .await
            .unwrap();

        assert_eq!(report.programmed, vec![ControlPosition::new(1).unwrap()]);
        assert!(matches!(
            report.failed[0].error,
            Error::Addressing(AddressingError::ButtonNotFound(4))
        ));
        assert!(!report.is_complete());

        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.strategy, UpdateStrategy::Recreate);
        let created = cache.find(Collection::Behaviours, &outcome.instance_id).unwrap();
        let button = SlotKey::Addressed("btn-1".into())
            .entry(&created["configuration"])
            .unwrap();
        assert_eq!(
            ObservedAction::from_button(button).unwrap().scene_ids(),
            vec!["s-a", "s-b"]
        );
    }

    #[tokio::test]
    async fn nothing_resolved_means_no_remote_write() {
        let (bridge, mut cache) = setup();
        let programs = vec![(
            ControlPosition::new(3).unwrap(),
            ButtonProgram::short(ButtonAction::dimming(DimDirection::Up)),
        )];

        let report = MutationEngine::new(&bridge, &mut cache)
            .reprogram_buttons("lounge", &programs)
            .await
            .unwrap();
        assert!(report.outcome.is_none());
        assert_eq!(report.failed.len(), 1);
        assert!(
            !bridge
                .calls()
                .iter()
                .any(|(m, _, _)| matches!(m, Method::Delete | Method::Post))
        );
    }
}
