// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capture, compare and restore a room against the in-memory bridge.

use std::path::PathBuf;

use hue_switchboard::action::{ButtonAction, ButtonProgram, DimDirection, ObservedAction, ProgramRequest};
use hue_switchboard::cache::{BridgeCache, Collection, StalenessPolicy};
use hue_switchboard::engine::MutationEngine;
use hue_switchboard::error::SnapshotError;
use hue_switchboard::protocol::MemoryBridge;
use hue_switchboard::snapshot::{ButtonChange, DiffOptions, Restorer, Snapshot, SnapshotStore};
use hue_switchboard::types::{ControlPosition, ResourceType};
use serde_json::{Value, json};

fn cycle(ids: &[&str]) -> Value {
    json!({"scene_cycle_extended": {
        "slots": ids.iter().map(|id| json!([{"action": {"recall": {"rid": id, "rtype": "scene"}}}])).collect::<Vec<_>>(),
        "with_off": {"enabled": false}
    }})
}

fn bridge() -> MemoryBridge {
    MemoryBridge::new()
        .with_record(
            ResourceType::Room,
            json!({
                "id": "room-1",
                "metadata": {"name": "Study", "archetype": "office"},
                "children": [{"rid": "dev-lamp", "rtype": "device"}, {"rid": "dev-1", "rtype": "device"}]
            }),
        )
        .with_record(
            ResourceType::Light,
            json!({
                "id": "light-1",
                "owner": {"rid": "dev-lamp", "rtype": "device"},
                "metadata": {"name": "Desk lamp"},
                "on": {"on": true},
                "dimming": {"brightness": 80.0}
            }),
        )
        .with_record(
            ResourceType::Scene,
            json!({"id": "s-focus", "metadata": {"name": "Focus"}, "group": {"rid": "room-1", "rtype": "room"}, "auto_dynamic": false}),
        )
        .with_record(
            ResourceType::Scene,
            json!({"id": "s-calm", "metadata": {"name": "Calm"}, "group": {"rid": "room-1", "rtype": "room"}, "auto_dynamic": true}),
        )
        .with_record(
            ResourceType::Device,
            json!({"id": "dev-1", "metadata": {"name": "Study dimmer"}}),
        )
        .with_record(
            ResourceType::BehaviorInstance,
            json!({
                "id": "inst-1",
                "script_id": "script-x",
                "enabled": true,
                "status": "running",
                "metadata": {"name": "Study dimmer"},
                "configuration": {
                    "device": {"rid": "dev-1", "rtype": "device"},
                    "button1": {
                        "on_short_release": cycle(&["s-focus", "s-calm"]),
                        "where": [{"group": {"rid": "room-1", "rtype": "room"}}]
                    }
                }
            }),
        )
}

fn temp_store() -> SnapshotStore {
    let dir: PathBuf =
        std::env::temp_dir().join(format!("hue_switchboard_snapshots_{}", uuid::Uuid::new_v4()));
    SnapshotStore::new(dir)
}

#[tokio::test]
async fn capture_change_and_restore() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    cache.refresh(&bridge).await.unwrap();

    // Capture and persist.
    let store = temp_store();
    let snapshot = Snapshot::capture(&cache, "study").unwrap();
    assert_eq!(snapshot.summary.light_count, 1);
    assert_eq!(snapshot.summary.scene_count, 2);
    assert_eq!(snapshot.summary.behaviour_count, 1);
    assert_eq!(snapshot.summary.device_count, 2);

    let path = store.save(&snapshot).unwrap();
    assert_eq!(store.latest_for("STUDY").unwrap(), path);
    let saved = store.load(store.resolve("study").unwrap()).unwrap();
    assert_eq!(saved.behaviours, snapshot.behaviours);
    assert!(saved.diff_against(&cache, DiffOptions::default()).is_empty());

    // Change the switch and a scene.
    let mut engine = MutationEngine::new(&bridge, &mut cache);
    engine
        .apply_request(
            "study",
            ControlPosition::new(1).unwrap(),
            &ProgramRequest::new().with_scenes(["Calm", "Focus"]),
        )
        .await
        .unwrap();
    engine.set_auto_dynamic("s-focus", true).await.unwrap();

    let diff = saved.diff_against(engine.cache(), DiffOptions::default());
    assert!(!diff.is_empty());
    assert_eq!(diff.scenes.changed.len(), 1);
    assert_eq!(diff.scenes.changed[0].changes[0].field, "auto_dynamic");
    assert_eq!(diff.behaviours.changed.len(), 1);
    let buttons = &diff.behaviours.changed[0].buttons;
    assert_eq!(buttons.len(), 1);
    assert_eq!(buttons[0].key, "button1");
    assert_eq!(buttons[0].change, ButtonChange::Reordered);

    // Restore the switch programming.
    let report = Restorer::new()
        .restore(&mut engine, &saved, |plan| {
            assert_eq!(plan.room_name, "Study");
            assert!(plan.instances.iter().all(|i| i.exists));
            true
        })
        .await;
    assert_eq!(report.counts(), (1, 0));
    let restored_id = &report.restored[0].instance_id;
    assert_ne!(restored_id, "inst-1");

    let restored = bridge
        .record(ResourceType::BehaviorInstance, restored_id)
        .unwrap();
    assert_eq!(restored["configuration"], saved.behaviours[0]["configuration"]);
    assert_eq!(
        ObservedAction::from_button(&restored["configuration"]["button1"])
            .unwrap()
            .scene_ids(),
        vec!["s-focus", "s-calm"]
    );

    let after = saved.diff_against(&cache, DiffOptions::default());
    assert_eq!(after.behaviours.removed[0].id, "inst-1");
    assert_eq!(after.behaviours.added[0].id, *restored_id);
    assert!(cache.find(Collection::Behaviours, "inst-1").is_none());

    std::fs::remove_dir_all(store.dir()).unwrap();
}

#[tokio::test]
async fn restore_after_recreate_keeps_one_instance_per_switch() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    cache.refresh(&bridge).await.unwrap();
    let saved = Snapshot::capture(&cache, "study").unwrap();

    let mut engine = MutationEngine::new(&bridge, &mut cache);
    let report = engine
        .reprogram_buttons(
            "study",
            &[(
                ControlPosition::new(1).unwrap(),
                ButtonProgram::short(ButtonAction::dimming(DimDirection::Up)),
            )],
        )
        .await
        .unwrap();
    let recreated = report.outcome.unwrap().instance_id;
    assert_ne!(recreated, "inst-1");

    let restore = Restorer::new()
        .with_confirmation_skipped(true)
        .restore(&mut engine, &saved, |_| true)
        .await;
    assert_eq!(restore.counts(), (1, 0));

    let instances = bridge.records(ResourceType::BehaviorInstance);
    assert_eq!(instances.len(), 1);
    assert!(bridge.record(ResourceType::BehaviorInstance, &recreated).is_none());
    assert_eq!(instances[0]["configuration"], saved.behaviours[0]["configuration"]);
    assert_eq!(cache.cached(Collection::Behaviours).len(), 1);
}

#[tokio::test]
async fn deleted_room_reports_everything_removed() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    cache.refresh(&bridge).await.unwrap();
    let saved = Snapshot::capture(&cache, "study").unwrap();

    cache.remove(Collection::Rooms, "room-1").unwrap();
    let diff = saved.diff_against(&cache, DiffOptions::default());
    assert!(diff.room.deleted);
    assert_eq!(diff.lights.removed.len(), 1);
    assert_eq!(diff.scenes.removed.len(), 2);
    assert_eq!(diff.behaviours.removed.len(), 1);
}

#[test]
fn unknown_snapshot_is_not_found() {
    let store = temp_store();
    assert!(store.list().unwrap().is_empty());
    assert!(matches!(store.resolve("attic"), Err(SnapshotError::NotFound(_))));
    assert!(matches!(
        store.load(store.dir().join("missing.json")),
        Err(SnapshotError::NotFound(_))
    ));
}
