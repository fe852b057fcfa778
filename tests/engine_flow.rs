// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end programming flows against the in-memory bridge.

use std::path::PathBuf;

use hue_switchboard::action::{ButtonAction, ButtonProgram, DimDirection, ObservedAction, ProgramRequest};
use hue_switchboard::cache::{BridgeCache, Collection, StalenessPolicy};
use hue_switchboard::engine::{MutationEngine, NewScene, UpdateStrategy};
use hue_switchboard::error::{AddressingError, Error};
use hue_switchboard::protocol::{MemoryBridge, Method};
use hue_switchboard::types::{ControlPosition, ResourceRef, ResourceType, TimeOfDay};
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
                "metadata": {"name": "Bedroom", "archetype": "bedroom"},
                "children": [{"rid": "dev-1", "rtype": "device"}]
            }),
        )
        .with_record(
            ResourceType::Scene,
            json!({"id": "s-night", "metadata": {"name": "Nightlight"}, "group": {"rid": "room-1", "rtype": "room"}}),
        )
        .with_record(
            ResourceType::Scene,
            json!({"id": "s-read", "metadata": {"name": "Read"}, "group": {"rid": "room-1", "rtype": "room"}}),
        )
        .with_record(
            ResourceType::Scene,
            json!({"id": "s-bright", "metadata": {"name": "Bright"}, "group": {"rid": "room-1", "rtype": "room"}}),
        )
        .with_record(
            ResourceType::Device,
            json!({"id": "dev-1", "metadata": {"name": "Bedside dimmer"}}),
        )
        .with_record(
            ResourceType::BehaviorInstance,
            json!({
                "id": "inst-1",
                "script_id": "script-x",
                "enabled": true,
                "metadata": {"name": "Bedside dimmer"},
                "configuration": {
                    "device": {"rid": "dev-1", "rtype": "device"},
                    "button1": {
                        "on_short_release": cycle(&["s-read", "s-bright"]),
                        "where": [{"group": {"rid": "room-1", "rtype": "room"}}]
                    },
                    "button2": {"on_short_release": {"action": "dim_up"}, "on_repeat": {"action": "dim_up"}},
                    "button3": {"on_short_release": {"action": "dim_down"}, "on_repeat": {"action": "dim_down"}}
                }
            }),
        )
}

fn pos(n: u16) -> ControlPosition {
    ControlPosition::new(n).unwrap()
}

fn temp_cache_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("hue_switchboard_flow_{}", uuid::Uuid::new_v4()))
        .join("cache.json")
}

// ============================================================================
// Programming
// ============================================================================

#[tokio::test]
async fn first_mutation_fills_cache_then_writes_through() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    let mut engine = MutationEngine::new(&bridge, &mut cache);

    let outcome = engine
        .apply_request(
            "bedside",
            pos(1),
            &ProgramRequest::new()
                .with_scenes(["Nightlight", "Read", "Bright"])
                .with_long_press("all_off"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.strategy, UpdateStrategy::InPlace);
    assert_eq!(outcome.switch, "Bedside dimmer");

    let refreshes = bridge
        .calls()
        .iter()
        .filter(|(m, _, id)| *m == Method::Get && id.is_none())
        .count();
    assert_eq!(refreshes, Collection::ALL.len());

    let on_bridge = bridge.record(ResourceType::BehaviorInstance, "inst-1").unwrap();
    let cached = cache.find(Collection::Behaviours, "inst-1").unwrap();
    assert_eq!(cached, &on_bridge);
    assert_eq!(
        ObservedAction::from_button(&cached["configuration"]["button1"])
            .unwrap()
            .scene_ids(),
        vec!["s-night", "s-read", "s-bright"]
    );
    assert_eq!(cached["configuration"]["button1"]["on_long_press"]["action"], "all_off");
    assert_eq!(cached["configuration"]["button1"]["where"][0]["group"]["rid"], "room-1");
}

#[tokio::test]
async fn time_based_replaces_cycle_by_recreate() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());

    let outcome = MutationEngine::new(&bridge, &mut cache)
        .apply_request(
            "Bedside dimmer",
            pos(1),
            &ProgramRequest::new()
                .time_based()
                .with_slot("22:30=Nightlight")
                .with_slot("07:00=Bright"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.strategy, UpdateStrategy::Recreate);
    assert_eq!(outcome.previous_instance_id, "inst-1");
    assert!(bridge.record(ResourceType::BehaviorInstance, "inst-1").is_none());

    let created = cache.find(Collection::Behaviours, &outcome.instance_id).unwrap();
    assert_eq!(created["script_id"], "script-x");
    assert_eq!(created["status"], "running");
    match ObservedAction::from_button(&created["configuration"]["button1"]).unwrap() {
        ObservedAction::TimeBased(slots) => {
            assert_eq!(slots.len(), 2);
            assert_eq!(slots[0], (TimeOfDay::new(7, 0).unwrap(), "s-bright".to_string()));
            assert_eq!(slots[1].1, "s-night");
        }
        other => panic!("expected a time-based action, got {other:?}"),
    }
    assert_eq!(created["configuration"]["button2"]["on_repeat"]["action"], "dim_up");
}

#[tokio::test]
async fn empty_request_on_button_three_dims_down() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());

    let outcome = MutationEngine::new(&bridge, &mut cache)
        .apply_request("bedside", pos(3), &ProgramRequest::new())
        .await
        .unwrap();
    assert_eq!(outcome.strategy, UpdateStrategy::InPlace);
    let cached = cache.find(Collection::Behaviours, "inst-1").unwrap();
    assert_eq!(cached["configuration"]["button3"]["on_repeat"]["action"], "dim_down");
}

#[tokio::test]
async fn partial_failure_leaves_switch_out_of_cache() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    cache.refresh(&bridge).await.unwrap();
    bridge.fail_next(Method::Post, ResourceType::BehaviorInstance);

    let err = MutationEngine::new(&bridge, &mut cache)
        .apply_request("bedside", pos(2), &ProgramRequest::new().with_scene("Read"))
        .await
        .unwrap_err();
    assert!(err.is_partial_failure());
    assert!(err.to_string().contains("Bedside dimmer"));
    assert!(cache.cached(Collection::Behaviours).is_empty());
    assert!(bridge.records(ResourceType::BehaviorInstance).is_empty());
}

#[tokio::test]
async fn unsaved_cache_still_forgets_deleted_instance() {
    let path = temp_cache_path();
    let bridge = bridge();
    let mut cache = BridgeCache::open(&path, StalenessPolicy::default()).unwrap();
    cache.refresh(&bridge).await.unwrap();

    // A directory in place of the cache file makes every save fail.
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir_all(path.join("blocked")).unwrap();
    bridge.fail_next(Method::Post, ResourceType::BehaviorInstance);

    let err = MutationEngine::new(&bridge, &mut cache)
        .apply_request("bedside", pos(2), &ProgramRequest::new().with_scene("Read"))
        .await
        .unwrap_err();
    match &err {
        Error::PartialFailure {
            deleted_instance,
            cache_error,
            ..
        } => {
            assert_eq!(deleted_instance, "inst-1");
            assert!(cache_error.is_some());
        }
        other => panic!("expected a partial failure, got {other:?}"),
    }
    assert!(cache.find(Collection::Behaviours, "inst-1").is_none());
    assert!(bridge.record(ResourceType::BehaviorInstance, "inst-1").is_none());
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[tokio::test]
async fn cache_file_reflects_mutation() {
    let path = temp_cache_path();
    let bridge = bridge();
    {
        let mut cache = BridgeCache::open(&path, StalenessPolicy::default()).unwrap();
        MutationEngine::new(&bridge, &mut cache)
            .apply_request("bedside", pos(1), &ProgramRequest::new().with_scenes(["Bright", "Read"]))
            .await
            .unwrap();
    }

    let reopened = BridgeCache::open(&path, StalenessPolicy::default()).unwrap();
    assert!(!reopened.is_stale());
    let cached = reopened.find(Collection::Behaviours, "inst-1").unwrap();
    assert_eq!(
        ObservedAction::from_button(&cached["configuration"]["button1"])
            .unwrap()
            .scene_ids(),
        vec!["s-bright", "s-read"]
    );
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

// ============================================================================
// Bulk and scenes
// ============================================================================

#[tokio::test]
async fn bulk_reprogram_skips_missing_dial() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());

    let programs = vec![
        (
            pos(2),
            ButtonProgram::short(ButtonAction::single_recall("s-read").unwrap()),
        ),
        (
            ControlPosition::ROTARY_ROTATE,
            ButtonProgram::short(ButtonAction::dimming(DimDirection::Up)),
        ),
        (
            pos(3),
            ButtonProgram::short(ButtonAction::scene_cycle(["s-night", "s-bright"]).unwrap()),
        ),
    ];
    let report = MutationEngine::new(&bridge, &mut cache)
        .reprogram_buttons("bedside", &programs)
        .await
        .unwrap();

    assert_eq!(report.programmed, vec![pos(2), pos(3)]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].error,
        Error::Addressing(AddressingError::ButtonNotFound(34))
    ));
    assert!(!report.is_complete());

    let outcome = report.outcome.unwrap();
    assert_eq!(outcome.strategy, UpdateStrategy::Recreate);
    let created = cache.find(Collection::Behaviours, &outcome.instance_id).unwrap();
    assert!(created["configuration"]["button2"].get("on_repeat").is_none());
    assert_eq!(
        ObservedAction::from_button(&created["configuration"]["button3"])
            .unwrap()
            .scene_ids(),
        vec!["s-night", "s-bright"]
    );
}

#[tokio::test]
async fn scene_lifecycle_updates_cache() {
    let bridge = bridge();
    let mut cache = BridgeCache::in_memory(StalenessPolicy::default());
    cache.refresh(&bridge).await.unwrap();
    let mut engine = MutationEngine::new(&bridge, &mut cache);

    let scene = NewScene::new("Evening", ResourceRef::new("room-1", "room"))
        .unwrap()
        .with_speed(0.3);
    let id = engine.create_scene(&scene).await.unwrap();
    let cached = engine.cache().find(Collection::Scenes, &id).unwrap();
    assert_eq!(cached["metadata"]["name"], "Evening");
    assert_eq!(cached["auto_dynamic"], true);

    engine.set_auto_dynamic(&id, false).await.unwrap();
    assert_eq!(
        engine.cache().find(Collection::Scenes, &id).unwrap()["auto_dynamic"],
        false
    );

    engine.activate_scene(&id).await.unwrap();
    engine.delete_scene(&id).await.unwrap();
    assert!(engine.cache().find(Collection::Scenes, &id).is_none());
    assert_eq!(cache.cached(Collection::Scenes).len(), 3);
}
