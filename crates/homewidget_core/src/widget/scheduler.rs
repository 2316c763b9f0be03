//! Refresh policy computation.
//!
//! # Invariants
//! - `next_refresh(kind, now).after >= now + min_delay(kind)`, saturating
//!   at the largest representable time.

use crate::config::WidgetDeployment;
use crate::model::entry::RefreshPolicy;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Delay used for kinds the scheduler was not configured with.
pub const FALLBACK_MIN_DELAY_SECS: u64 = 15 * 60;

/// Maps widget kinds to their minimum refresh delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshScheduler {
    delays: BTreeMap<String, Duration>,
    fallback: Duration,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self {
            delays: BTreeMap::new(),
            fallback: delay_from_secs(FALLBACK_MIN_DELAY_SECS),
        }
    }

    /// Builds a scheduler from every kind in a deployment.
    pub fn from_deployment(deployment: &WidgetDeployment) -> Self {
        deployment
            .kinds
            .iter()
            .fold(Self::new(), |scheduler, kind| {
                scheduler.with_kind(&kind.kind, kind.min_refresh_secs)
            })
    }

    pub fn with_kind(mut self, kind: &str, min_delay_secs: u64) -> Self {
        self.delays
            .insert(kind.to_string(), delay_from_secs(min_delay_secs));
        self
    }

    /// Minimum delay for `kind`.
    pub fn min_delay(&self, kind: &str) -> Duration {
        self.delays.get(kind).copied().unwrap_or(self.fallback)
    }

    /// Earliest time the renderer should regenerate `kind` again.
    pub fn next_refresh(&self, kind: &str, now: DateTime<Utc>) -> RefreshPolicy {
        let after = now
            .checked_add_signed(self.min_delay(kind))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        RefreshPolicy { after }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn delay_from_secs(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}
