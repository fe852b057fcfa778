// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `hue_switchboard` - program, back up and restore Philips Hue switches.
//!
//! Hue dimmer switches and tap dials are programmed through *behaviour
//! instances* on the bridge. This library turns intent such as "cycle
//! Read and Relax on the On button" into those instances, applies it
//! through the bridge API and keeps a local mirror of bridge state current
//! after every change.
//!
//! # Features
//!
//! - **Button programs**: scene cycles, time-based schedules, single scene
//!   recall, dimming and long-press actions ([`action`], [`builder`])
//! - **Both addressing schemes**: legacy `buttonN` keys and per-resource
//!   `buttons` maps ([`adapter`])
//! - **Safe mutations**: in-place update while the action kind is unchanged,
//!   delete and recreate otherwise ([`engine`])
//! - **Write-through cache**: a JSON document refreshed when stale and updated
//!   after every accepted write ([`cache`])
//! - **Snapshots**: capture a room, compare it with the live state and
//!   restore its switch programming ([`snapshot`])
//! - **Monitoring**: poll for button presses ([`monitor`])
//!
//! # Quick Start
//!
//! ```no_run
//! use hue_switchboard::action::ProgramRequest;
//! use hue_switchboard::config::Settings;
//! use hue_switchboard::engine::MutationEngine;
//! use hue_switchboard::types::ControlPosition;
//!
//! #[tokio::main]
//! async fn main() -> hue_switchboard::Result<()> {
//!     let settings = Settings::load();
//!     let bridge = settings.bridge_config()?.into_client()?;
//!     let mut cache = settings.open_cache()?;
//!     let mut engine = MutationEngine::new(&bridge, &mut cache);
//!
//!     let request = ProgramRequest::new().with_scenes(["Read", "Relax"]);
//!     let outcome = engine
//!         .apply_request("Office dimmer", ControlPosition::new(1)?, &request)
//!         .await?;
//!     println!("{} updated ({})", outcome.switch, outcome.strategy);
//!     Ok(())
//! }
//! ```
//!
//! ## Backing up a room
//!
//! ```no_run
//! use hue_switchboard::cache::{BridgeCache, StalenessPolicy};
//! use hue_switchboard::protocol::HttpClient;
//! use hue_switchboard::snapshot::{DiffOptions, Snapshot, SnapshotStore};
//!
//! #[tokio::main]
//! async fn main() -> hue_switchboard::Result<()> {
//!     let bridge = HttpClient::new("192.168.1.2", "application-key")?;
//!     let mut cache = BridgeCache::open("cache.json", StalenessPolicy::default())?;
//!     cache.refresh(&bridge).await?;
//!
//!     let store = SnapshotStore::new("snapshots");
//!     let path = store.save(&Snapshot::capture(&cache, "living room")?)?;
//!
//!     let saved = store.load(&path)?;
//!     assert!(saved.diff_against(&cache, DiffOptions::default()).is_empty());
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). A failed
//! recreate that left a switch without its instance is reported as
//! [`Error::PartialFailure`] and must be surfaced to the user.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod action;
pub mod adapter;
pub mod builder;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod resolve;
pub mod snapshot;
pub mod types;

pub use cache::{BridgeCache, Collection, StalenessPolicy};
pub use engine::{MutationEngine, MutationOutcome, UpdateStrategy};
pub use error::{
    AddressingError, CacheError, Error, LookupError, ParseError, ProtocolError, Result,
    SnapshotError, ValueError,
};
pub use protocol::{BridgeApi, MemoryBridge};
#[cfg(feature = "http")]
pub use protocol::{BridgeConfig, HttpClient};
pub use snapshot::{Snapshot, SnapshotStore, StructuredDiff};
pub use types::{ButtonEventCode, ControlPosition, ResourceRef, ResourceType, TimeOfDay};
