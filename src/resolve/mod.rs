// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mapping human-entered names to bridge identifiers.
//!
//! Names are matched case-insensitively in four tiers: exact, prefix,
//! substring, then a character-sequence similarity score. The first tier with
//! any match decides. Several distinct resources in that tier are reported as
//! [`LookupError::Ambiguous`] with every candidate listed; the library never
//! picks the first one.

mod program;
mod switch;

pub use program::{resolve_program, resolve_scene, resolve_scope};
pub use switch::{SwitchTarget, resolve_switch, switch_names};

use crate::error::LookupError;

/// Scores how closely two names match, case-insensitively.
///
/// - 100: equal
/// - 80: one is a prefix of the other
/// - 60: one contains the other
/// - 21-50: proportional to the characters of `a` found in order in `b`
/// - 0: no useful match
///
/// # Examples
///
/// ```
/// use hue_switchboard::resolve::similarity_score;
///
/// assert_eq!(similarity_score("Relax", "relax"), 100);
/// assert_eq!(similarity_score("Rel", "Relax"), 80);
/// assert_eq!(similarity_score("lax", "Relax"), 60);
/// assert_eq!(similarity_score("Rlx", "Relax"), 30);
/// assert_eq!(similarity_score("xyz", "Relax"), 0);
/// ```
#[must_use]
pub fn similarity_score(a: &str, b: &str) -> u8 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    if a == b {
        return 100;
    }
    if a.starts_with(&b) || b.starts_with(&a) {
        return 80;
    }
    if a.contains(&b) || b.contains(&a) {
        return 60;
    }

    let target: Vec<char> = b.chars().collect();
    let mut matches = 0usize;
    let mut j = 0usize;
    for ch in a.chars() {
        while j < target.len() {
            j += 1;
            if target[j - 1] == ch {
                matches += 1;
                break;
            }
        }
    }

    let longest = a.chars().count().max(target.len());
    if matches == 0 || longest == 0 {
        return 0;
    }
    let score = matches * 50 / longest;
    if score > 20 {
        u8::try_from(score).unwrap_or(0)
    } else {
        0
    }
}

/// Returns up to `limit` candidates similar to `target`, best first.
///
/// Candidates scoring 0 are left out. Equal scores keep input order.
#[must_use]
pub fn find_similar<'a, I>(target: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(u8, &str)> = candidates
        .into_iter()
        .map(|c| (similarity_score(target, c), c))
        .filter(|&(score, _)| score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, c)| c.to_string())
        .collect()
}

/// Number of suggestions attached to a not-found error.
pub const SUGGESTION_LIMIT: usize = 5;

/// Resolves `query` against `(id, name)` candidates.
///
/// Several entries with the same identifier count as one candidate.
///
/// # Errors
///
/// - `LookupError::NotFound` with close names as suggestions if nothing
///   matches
/// - `LookupError::Ambiguous` listing every candidate of the deciding tier
///
/// # Examples
///
/// ```
/// use hue_switchboard::error::LookupError;
/// use hue_switchboard::resolve::resolve_name;
///
/// let scenes = [("s1", "Relax"), ("s2", "Read"), ("s3", "Relax evening")];
///
/// assert_eq!(resolve_name("scene", "relax", &scenes).unwrap(), "s1");
/// assert_eq!(resolve_name("scene", "rea", &scenes).unwrap(), "s2");
/// assert!(matches!(
///     resolve_name("scene", "re", &scenes),
///     Err(LookupError::Ambiguous { .. })
/// ));
/// ```
pub fn resolve_name<'a>(
    kind: &'static str,
    query: &str,
    candidates: &[(&'a str, &'a str)],
) -> Result<&'a str, LookupError> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Err(LookupError::NotFound {
            kind,
            query: query.to_string(),
            suggestions: Vec::new(),
        });
    }

    let tiers: [&dyn Fn(&str) -> bool; 3] = [
        &|name: &str| name == needle,
        &|name: &str| name.starts_with(&needle),
        &|name: &str| name.contains(&needle),
    ];

    for tier in tiers {
        let hits: Vec<_> = candidates
            .iter()
            .filter(|(_, name)| tier(&name.to_lowercase()))
            .copied()
            .collect();
        if let Some(found) = decide(kind, query, &hits)? {
            return Ok(found);
        }
    }

    let best = candidates
        .iter()
        .map(|&(id, name)| (similarity_score(&needle, name), id, name))
        .filter(|&(score, _, _)| score > 0)
        .max_by_key(|&(score, _, _)| score)
        .map(|(score, _, _)| score);

    if let Some(best) = best {
        let hits: Vec<_> = candidates
            .iter()
            .filter(|(_, name)| similarity_score(&needle, name) == best)
            .copied()
            .collect();
        if let Some(found) = decide(kind, query, &hits)? {
            tracing::debug!(query, found, score = best, "Resolved name by similarity");
            return Ok(found);
        }
    }

    Err(LookupError::NotFound {
        kind,
        query: query.to_string(),
        suggestions: find_similar(query, candidates.iter().map(|&(_, n)| n), SUGGESTION_LIMIT),
    })
}

fn decide<'a>(
    kind: &'static str,
    query: &str,
    hits: &[(&'a str, &'a str)],
) -> Result<Option<&'a str>, LookupError> {
    let mut ids: Vec<&'a str> = hits.iter().map(|&(id, _)| id).collect();
    ids.sort_unstable();
    ids.dedup();
    match ids.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => {
            let mut names: Vec<String> = Vec::new();
            for &(_, name) in hits {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            Err(LookupError::Ambiguous {
                kind,
                query: query.to_string(),
                candidates: names,
            })
        }
    }
}
