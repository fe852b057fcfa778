// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Turning a validated request into identifiers.

use super::{SUGGESTION_LIMIT, find_similar, resolve_name};
use crate::action::{
    ButtonAction, ButtonProgram, Dimming, LongPressAction, LongPressIntent, ProgramIntent,
    ShortPressIntent, TimeSchedule, TimeSlot,
};
use crate::cache::{BridgeCache, Collection};
use crate::error::{LookupError, Result};
use crate::types::{ResourceRef, record_id, record_name};

fn named(cache: &BridgeCache, collection: Collection) -> Vec<(&str, &str)> {
    cache
        .cached(collection)
        .iter()
        .filter_map(|r| Some((record_id(r)?, record_name(r)?)))
        .collect()
}

/// Resolves a scene name to its identifier.
///
/// # Errors
///
/// Returns `LookupError::NotFound` or `LookupError::Ambiguous`.
pub fn resolve_scene(cache: &BridgeCache, name: &str) -> std::result::Result<String, LookupError> {
    resolve_name("scene", name, &named(cache, Collection::Scenes)).map(str::to_string)
}

/// Resolves a dimming scope, trying zones before rooms.
///
/// # Errors
///
/// Returns `LookupError::Ambiguous` if the deciding collection has several
/// matches, or `LookupError::NotFound` with suggestions from both
/// collections.
pub fn resolve_scope(
    cache: &BridgeCache,
    name: &str,
) -> std::result::Result<ResourceRef, LookupError> {
    let zones = named(cache, Collection::Zones);
    match resolve_name("zone", name, &zones) {
        Ok(id) => return Ok(ResourceRef::new(id, "zone")),
        Err(LookupError::NotFound { .. }) => {}
        Err(e) => return Err(e),
    }

    let rooms = named(cache, Collection::Rooms);
    match resolve_name("room", name, &rooms) {
        Ok(id) => Ok(ResourceRef::new(id, "room")),
        Err(LookupError::NotFound { .. }) => Err(LookupError::NotFound {
            kind: "zone or room",
            query: name.to_string(),
            suggestions: find_similar(
                name,
                zones.iter().chain(&rooms).map(|&(_, n)| n),
                SUGGESTION_LIMIT,
            ),
        }),
        Err(e) => Err(e),
    }
}

/// Resolves every name in `intent` against the cache.
///
/// # Errors
///
/// - `Error::Lookup` for a name that resolves to no or several resources
/// - `Error::Validation` if the resolved identifiers do not form a valid
///   program
pub fn resolve_program(intent: &ProgramIntent, cache: &BridgeCache) -> Result<ButtonProgram> {
    let short_press = match &intent.short_press {
        None => None,
        Some(ShortPressIntent::SceneCycle(names)) => {
            let ids = names
                .iter()
                .map(|n| resolve_scene(cache, n))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Some(ButtonAction::scene_cycle(ids)?)
        }
        Some(ShortPressIntent::TimeBased(slots)) => {
            let slots = slots
                .iter()
                .map(|(time, name)| Ok(TimeSlot::new(*time, resolve_scene(cache, name)?)?))
                .collect::<Result<Vec<_>>>()?;
            Some(ButtonAction::TimeBased(TimeSchedule::new(slots)?))
        }
        Some(ShortPressIntent::SingleScene(name)) => {
            Some(ButtonAction::single_recall(resolve_scene(cache, name)?)?)
        }
        Some(ShortPressIntent::Dimming { direction, scope }) => {
            let mut dimming = Dimming::new(*direction);
            if let Some(scope) = scope {
                dimming = dimming.with_scope(resolve_scope(cache, scope)?)?;
            }
            Some(ButtonAction::Dimming(dimming))
        }
    };

    let long_press = match &intent.long_press {
        None => None,
        Some(LongPressIntent::System(action)) => Some(LongPressAction::System(*action)),
        Some(LongPressIntent::Scene(name)) => {
            Some(LongPressAction::scene(resolve_scene(cache, name)?)?)
        }
    };

    Ok(ButtonProgram::new(short_press, long_press)?)
}
