// ─── Canary rollout state ───
// Per (tag, variant) rollout bookkeeping for the stored artifact.
//
//   current \ requested   none            p
//   (no record)           NoCanary        Active(now, p)
//   NoCanary              keep            Active(now, p)
//   Active(t, p0)         NoCanary        keep if p == p0, else Active(t, p)

use chrono::{DateTime, Utc};

use crate::core::catalog::Canary;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanaryState {
    NoCanary,
    Active(Canary),
}

impl CanaryState {
    pub fn from_stored(canary: Option<Canary>) -> Self {
        match canary {
            Some(c) if c.percent > 0.0 => CanaryState::Active(c),
            _ => CanaryState::NoCanary,
        }
    }

    pub fn into_stored(self) -> Option<Canary> {
        match self {
            CanaryState::NoCanary => None,
            CanaryState::Active(c) => Some(c),
        }
    }
}

/// Outcome of one cycle for a single stored artifact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanaryDecision {
    /// Persisted state already matches the request; nothing is written.
    Keep,
    /// Persist this state.
    Set(CanaryState),
}

/// `None` and `0` both mean no rollout was requested this cycle.
pub fn requested_percent(declared: Option<f64>) -> Option<f64> {
    declared.filter(|p| *p > 0.0).map(|p| p.min(100.0))
}

/// Advance the rollout state of one artifact.
///
/// `current` is `None` when there is no stored record for this artifact yet
/// (or the stored one holds different bytes). A percent-only change keeps the
/// original `published_at`, so it keeps measuring how long the rollout has run.
pub fn advance(
    current: Option<CanaryState>,
    declared: Option<f64>,
    now: DateTime<Utc>,
) -> CanaryDecision {
    let requested = requested_percent(declared);

    match (current, requested) {
        (None, None) => CanaryDecision::Set(CanaryState::NoCanary),
        (None, Some(percent)) => CanaryDecision::Set(CanaryState::Active(Canary {
            published_at: now,
            percent,
        })),
        (Some(CanaryState::NoCanary), None) => CanaryDecision::Keep,
        (Some(CanaryState::NoCanary), Some(percent)) => {
            CanaryDecision::Set(CanaryState::Active(Canary {
                published_at: now,
                percent,
            }))
        }
        (Some(CanaryState::Active(active)), Some(percent)) if active.percent == percent => {
            CanaryDecision::Keep
        }
        (Some(CanaryState::Active(active)), Some(percent)) => {
            CanaryDecision::Set(CanaryState::Active(Canary {
                published_at: active.published_at,
                percent,
            }))
        }
        (Some(CanaryState::Active(_)), None) => CanaryDecision::Set(CanaryState::NoCanary),
    }
}
