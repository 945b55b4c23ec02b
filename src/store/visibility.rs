//! Rules deciding when a stored digest may be handed back.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Default delay used by both policies, in seconds
pub const DEFAULT_VISIBILITY_DELAY_SECS: u64 = 5;

/// How the creation time of an entry is compared against the current time
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityPolicy {
    /// Compare only the seconds-of-minute components of both timestamps.
    ///
    /// The digest is visible while `delay >= now.second() - created.second()`.
    /// Right after creation that holds, a little over `delay` seconds later it
    /// stops holding, and once the minute rolls over the difference goes
    /// negative and the digest is visible again.
    #[default]
    SecondOfMinute,
    /// Compare the true elapsed duration: the digest becomes visible once
    /// `now - created >= delay` and stays visible from then on.
    Elapsed,
}

impl std::fmt::Display for VisibilityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SecondOfMinute => f.write_str("second-of-minute"),
            Self::Elapsed => f.write_str("elapsed"),
        }
    }
}

/// A policy together with its delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    /// Comparison applied to the two timestamps
    pub policy: VisibilityPolicy,
    /// Delay in whole seconds
    pub delay_secs: u64,
}

impl Visibility {
    /// Creates a visibility rule.
    #[must_use]
    pub fn new(policy: VisibilityPolicy, delay_secs: u64) -> Self {
        Self { policy, delay_secs }
    }

    /// Whether an entry created at `created_at` may be returned at `now`.
    #[must_use]
    pub fn is_visible(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let delay = i64::try_from(self.delay_secs).unwrap_or(i64::MAX);

        match self.policy {
            VisibilityPolicy::SecondOfMinute => {
                let elapsed = i64::from(now.second()) - i64::from(created_at.second());
                delay >= elapsed
            }
            VisibilityPolicy::Elapsed => {
                now.signed_duration_since(created_at).num_seconds() >= delay
            }
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(VisibilityPolicy::default(), DEFAULT_VISIBILITY_DELAY_SECS)
    }
}
