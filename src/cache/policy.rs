// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cache staleness rules and reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// When a cache must be refreshed.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use hue_switchboard::cache::StalenessPolicy;
///
/// let policy = StalenessPolicy::default();
/// let now = Utc::now();
///
/// assert!(policy.is_stale(Some(now - Duration::hours(25)), now));
/// assert!(!policy.is_stale(Some(now - Duration::hours(23)), now));
/// assert!(policy.is_stale(None, now));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl StalenessPolicy {
    /// Default maximum age in hours.
    pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

    /// Creates a policy with the given maximum age.
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    /// Sets the maximum age in hours.
    ///
    /// Negative values count as zero. A value too large for a duration keeps
    /// the default of 24 hours.
    #[must_use]
    pub fn with_max_age_hours(mut self, hours: i64) -> Self {
        self.max_age = Duration::try_hours(hours.max(0)).unwrap_or_else(|| {
            tracing::warn!(hours, "Cache max age out of range, using the default");
            Duration::hours(Self::DEFAULT_MAX_AGE_HOURS)
        });
        self
    }

    /// Returns the maximum age.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Returns `true` if a cache refreshed at `last_updated` is older than the
    /// maximum age at `now`. A cache that was never refreshed is stale.
    #[must_use]
    pub fn is_stale(&self, last_updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_updated.is_none_or(|at| now - at > self.max_age)
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::hours(Self::DEFAULT_MAX_AGE_HOURS))
    }
}

/// Summary of the cache state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    /// Whether any cache has been loaded or fetched.
    pub exists: bool,
    /// Time of the last full refresh.
    pub last_updated: Option<DateTime<Utc>>,
    /// Age of the cache in hours.
    pub age_hours: Option<f64>,
    /// Whether the cache is stale under the current policy.
    pub stale: bool,
    /// Number of records per collection.
    pub counts: BTreeMap<&'static str, usize>,
    /// Number of local button mappings.
    pub button_mappings: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundaries() {
        let policy = StalenessPolicy::default();
        let now = Utc::now();
        assert!(policy.is_stale(Some(now - Duration::hours(25)), now));
        assert!(!policy.is_stale(Some(now - Duration::hours(23)), now));
        assert!(!policy.is_stale(Some(now - Duration::hours(24)), now));
    }

    #[test]
    fn custom_threshold() {
        let policy = StalenessPolicy::default().with_max_age_hours(1);
        let now = Utc::now();
        assert!(policy.is_stale(Some(now - Duration::minutes(61)), now));
        assert_eq!(policy.max_age(), Duration::hours(1));
    }

    #[test]
    fn out_of_range_hours_do_not_panic() {
        let policy = StalenessPolicy::default().with_max_age_hours(i64::MAX);
        assert_eq!(policy.max_age(), Duration::hours(24));

        let policy = StalenessPolicy::default().with_max_age_hours(-5);
        assert_eq!(policy.max_age(), Duration::zero());
    }
}
