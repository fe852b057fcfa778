// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polling switches for button presses.
//!
//! The bridge has no push channel in this library, so presses are found by
//! reading the `button` collection on a fixed interval and comparing each
//! `button_report.updated` stamp with the one seen on the previous poll.
//! The first poll only records the current stamps.
//!
//! The poll loop runs as a spawned task and hands events to the caller
//! through a channel. It reads device names and button mappings from a copy
//! taken when the monitor starts and never writes to the cache.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hue_switchboard::cache::{BridgeCache, StalenessPolicy};
//! use hue_switchboard::monitor::ButtonMonitor;
//! use hue_switchboard::protocol::HttpClient;
//!
//! #[tokio::main]
//! async fn main() -> hue_switchboard::Result<()> {
//!     let bridge = Arc::new(HttpClient::new("192.168.1.2", "application-key")?);
//!     let cache = BridgeCache::open("cache.json", StalenessPolicy::default())?;
//!
//!     let (handle, mut events) = ButtonMonitor::from_cache(&cache).start(bridge);
//!     while let Some(event) = events.recv().await {
//!         println!("{event}");
//!     }
//!     handle.cancel().await;
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::{BridgeCache, Collection, mapping_key};
use crate::protocol::BridgeApi;
use crate::types::{ButtonEventCode, ResourceType, display_name, nested_ref, record_id};

/// Default time between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted time between polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A button press seen by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEvent {
    /// Switch device identifier.
    pub device_id: String,
    /// Switch display name.
    pub device_name: String,
    /// Button resource identifier.
    pub button_id: String,
    /// Decoded event code.
    pub code: ButtonEventCode,
    /// Bridge timestamp of the report.
    pub updated: String,
    /// Scene mapped locally to this button event.
    pub mapped_scene: Option<String>,
}

impl fmt::Display for ButtonEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.device_name, self.code)?;
        if let Some(scene) = &self.mapped_scene {
            write!(f, " -> {scene}")?;
        }
        Ok(())
    }
}

/// Configures and starts a poll loop.
#[derive(Debug, Clone)]
pub struct ButtonMonitor {
    interval: Duration,
    capacity: usize,
    device_names: HashMap<String, String>,
    mappings: BTreeMap<String, String>,
}

impl Default for ButtonMonitor {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            capacity: DEFAULT_CHANNEL_CAPACITY,
            device_names: HashMap::new(),
            mappings: BTreeMap::new(),
        }
    }
}

impl ButtonMonitor {
    /// Creates a monitor with no device names or mappings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a monitor using device names and button mappings from the
    /// cache.
    #[must_use]
    pub fn from_cache(cache: &BridgeCache) -> Self {
        let device_names = cache
            .cached(Collection::Devices)
            .iter()
            .filter_map(|d| Some((record_id(d)?.to_string(), display_name(d))))
            .collect();
        Self {
            device_names,
            mappings: cache.button_mappings(),
            ..Self::default()
        }
    }

    /// Sets the poll interval, raised to [`MIN_POLL_INTERVAL`] if shorter.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            tracing::warn!(requested = ?interval, "Poll interval too short, using the minimum");
        }
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Sets how many undelivered events may queue up. Further events wait
    /// for the receiver.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Spawns the poll loop.
    ///
    /// The loop ends when the handle is cancelled or dropped, or when the
    /// receiver is dropped. Failed polls are logged and retried on the next
    /// tick.
    #[must_use]
    pub fn start<B>(self, bridge: Arc<B>) -> (MonitorHandle, mpsc::Receiver<ButtonEvent>)
    where
        B: BridgeApi + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(self.capacity);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(bridge, events_tx, cancel_rx));
        (
            MonitorHandle {
                cancel: cancel_tx,
                task: Some(task),
            },
            events_rx,
        )
    }

    async fn run<B: BridgeApi>(
        self,
        bridge: Arc<B>,
        events: mpsc::Sender<ButtonEvent>,
        mut cancel: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_seen: Option<HashMap<String, String>> = None;

        tracing::info!(interval = ?self.interval, "Button monitor started");
        'poll: loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.changed() => break,
            }

            let buttons = tokio::select! {
                result = bridge.get(ResourceType::Button, None) => match result {
                    Ok(buttons) => buttons,
                    Err(e) => {
                        tracing::warn!(error = %e, "Button poll failed");
                        continue;
                    }
                },
                _ = cancel.changed() => break,
            };

            let reports: Vec<Report> = buttons.iter().filter_map(Report::read).collect();
            if last_seen.is_none() {
                last_seen = Some(
                    reports
                        .into_iter()
                        .map(|r| (r.button_id, r.updated))
                        .collect(),
                );
                continue;
            }
            let previous = last_seen.get_or_insert_with(HashMap::new);

            for report in reports {
                if previous.get(&report.button_id) == Some(&report.updated) {
                    continue;
                }
                previous.insert(report.button_id.clone(), report.updated.clone());

                let Some(event) = self.event_for(report) else {
                    continue;
                };
                tracing::debug!(device = %event.device_name, code = event.code.raw(), "Button event");
                // A full channel must not keep the loop from seeing a cancel.
                tokio::select! {
                    sent = events.send(event) => if sent.is_err() {
                        tracing::debug!("Event receiver dropped");
                        return;
                    },
                    _ = cancel.changed() => break 'poll,
                }
            }
        }
        tracing::info!("Button monitor stopped");
    }

    fn event_for(&self, report: Report) -> Option<ButtonEvent> {
        let offset = match report.event.as_str() {
            "initial_press" => 0,
            "repeat" => 1,
            "short_release" => 2,
            "long_release" => 3,
            other => {
                tracing::debug!(event = other, button = %report.button_id, "Unhandled button event");
                return None;
            }
        };
        let code = ButtonEventCode::decode(u32::from(report.control_id) * 1000 + offset)?;
        let device_name = self
            .device_names
            .get(&report.device_id)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string());
        let mapped_scene = self
            .mappings
            .get(&mapping_key(&report.device_id, code.raw()))
            .cloned();

        Some(ButtonEvent {
            device_id: report.device_id,
            device_name,
            button_id: report.button_id,
            code,
            updated: report.updated,
            mapped_scene,
        })
    }
}

/// The latest report of one button resource.
struct Report {
    button_id: String,
    device_id: String,
    control_id: u16,
    event: String,
    updated: String,
}

impl Report {
    fn read(button: &Value) -> Option<Self> {
        let state = button.get("button")?;
        let (event, updated) = match state.get("button_report") {
            Some(report) => (
                report.get("event")?.as_str()?,
                report.get("updated")?.as_str()?,
            ),
            None => (state.get("last_event")?.as_str()?, ""),
        };
        Some(Self {
            button_id: record_id(button)?.to_string(),
            device_id: nested_ref(button, "owner")?.rid,
            control_id: button
                .get("metadata")
                .and_then(|m| m.get("control_id"))
                .and_then(Value::as_u64)
                .and_then(|id| u16::try_from(id).ok())
                .unwrap_or(1),
            event: event.to_string(),
            updated: updated.to_string(),
        })
    }
}

/// Stops a running monitor. Dropping the handle stops it too.
#[derive(Debug)]
pub struct MonitorHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Returns `true` once the poll loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the poll loop and waits for it to end.
    pub async fn cancel(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Button monitor ended abnormally");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheDocument, StalenessPolicy};
    use crate::protocol::MemoryBridge;
    use serde_json::json;

    fn button(updated: &str, event: &str) -> Value {
        button_with_id("btn-1", updated, event)
    }

    fn button_with_id(id: &str, updated: &str, event: &str) -> Value {
        json!({
            "id": id,
            "owner": {"rid": "dev-1", "rtype": "device"},
            "metadata": {"control_id": 4},
            "button": {"button_report": {"event": event, "updated": updated}}
        })
    }

    fn monitor() -> ButtonMonitor {
        let mut cache = BridgeCache::from_document(
            CacheDocument {
                devices: vec![json!({"id": "dev-1", "metadata": {"name": "Hall dimmer"}})],
                ..CacheDocument::default()
            },
            StalenessPolicy::default(),
        );
        cache.set_button_mapping("dev-1", 4002, "scene-night").unwrap();
        ButtonMonitor::from_cache(&cache)
    }

    #[test]
    fn reads_reports() {
        let report = Report::read(&button("t1", "long_release")).unwrap();
        assert_eq!(report.control_id, 4);
        assert_eq!(report.device_id, "dev-1");
        assert!(Report::read(&json!({"id": "x", "button": {}})).is_none());

        let event = monitor().event_for(report).unwrap();
        assert_eq!(event.code.raw(), 4003);
        assert_eq!(event.to_string(), "Hall dimmer: Off (Long Release)");
        assert!(event.mapped_scene.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn emits_only_new_presses() {
        let bridge = Arc::new(
            MemoryBridge::new().with_record(ResourceType::Button, button("t0", "short_release")),
        );
        let (handle, mut events) = monitor().start(Arc::clone(&bridge));

        tokio::time::sleep(Duration::from_millis(750)).await;
        assert!(events.try_recv().is_err());

        bridge.insert(ResourceType::Button, button("t1", "short_release"));
        let event = events.recv().await.unwrap();
        assert_eq!(event.code.raw(), 4002);
        assert_eq!(event.device_name, "Hall dimmer");
        assert_eq!(event.mapped_scene.as_deref(), Some("scene-night"));

        handle.cancel().await;
        assert!(events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_polling() {
        let bridge = Arc::new(MemoryBridge::new());
        let (handle, mut events) = ButtonMonitor::new()
            .with_interval(Duration::from_millis(100))
            .start(Arc::clone(&bridge));

        tokio::time::sleep(Duration::from_millis(250)).await;
        drop(handle);
        assert!(events.recv().await.is_none());

        let polls = bridge.calls().len();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(bridge.calls().len(), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_while_receiver_is_full() {
        let bridge = Arc::new(
            MemoryBridge::new()
                .with_record(ResourceType::Button, button_with_id("btn-1", "t0", "short_release"))
                .with_record(ResourceType::Button, button_with_id("btn-2", "t0", "short_release"))
                .with_record(ResourceType::Button, button_with_id("btn-3", "t0", "short_release")),
        );
        let (handle, events) = monitor()
            .with_capacity(1)
            .with_interval(Duration::from_millis(100))
            .start(Arc::clone(&bridge));
        tokio::time::sleep(Duration::from_millis(150)).await;

        for id in ["btn-1", "btn-2", "btn-3"] {
            bridge.insert(ResourceType::Button, button_with_id(id, "t1", "initial_press"));
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!handle.is_finished());

        let stopped = tokio::time::timeout(Duration::from_secs(5), handle.cancel()).await;
        assert!(stopped.is_ok());
        drop(events);
    }

    #[test]
    fn interval_has_a_floor() {
        let monitor = ButtonMonitor::new().with_interval(Duration::ZERO);
        assert_eq!(monitor.interval, MIN_POLL_INTERVAL);
        let monitor = ButtonMonitor::new().with_interval(Duration::from_secs(2));
        assert_eq!(monitor.interval, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_polls() {
        let bridge = Arc::new(MemoryBridge::new());
        let (handle, _events) = ButtonMonitor::new()
            .with_interval(Duration::ZERO)
            .start(Arc::clone(&bridge));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(!handle.is_finished());
        assert!(!bridge.calls().is_empty());
        handle.cancel().await;
    }
}
