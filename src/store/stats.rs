//! Running count and average processing time of digest submissions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Online aggregate over all completed submissions
///
/// Only the count and the running total are kept; the average is derived on
/// demand with integer division.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsAggregator {
    request_count: u64,
    total_processing_us: u64,
}

impl StatsAggregator {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed submission that took `elapsed`.
    pub fn record(&mut self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.request_count += 1;
        self.total_processing_us = self.total_processing_us.saturating_add(micros);
    }

    /// Number of completed submissions
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    /// Sum of all processing times in microseconds
    #[must_use]
    pub fn total_processing_us(&self) -> u64 {
        self.total_processing_us
    }

    /// Average processing time in microseconds, 0 before the first submission
    #[must_use]
    pub fn average_us(&self) -> u64 {
        self.total_processing_us
            .checked_div(self.request_count)
            .unwrap_or(0)
    }

    /// Point-in-time copy of the aggregate
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            request_count: self.request_count,
            average: self.average_us(),
            total_processing_us: self.total_processing_us,
        }
    }
}

/// Statistics document served by `/stats`
///
/// Serializes as `{"RequestCounts": N, "Average": A}`; the running total is
/// kept for callers but not part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Number of completed submissions
    #[serde(rename = "RequestCounts")]
    pub request_count: u64,
    /// Average processing time per submission in microseconds
    #[serde(rename = "Average")]
    pub average: u64,
    /// Sum of all processing times in microseconds
    #[serde(skip)]
    pub total_processing_us: u64,
}
