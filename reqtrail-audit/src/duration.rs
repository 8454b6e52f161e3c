//! Slow request detection

use chrono::{DateTime, Utc};
use reqtrail_config::DurationLimit;

/// Compares request durations against the configured limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationMonitor {
    limit: DurationLimit,
}

impl DurationMonitor {
    pub fn new(limit: DurationLimit) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> DurationLimit {
        self.limit
    }

    /// Milliseconds between `started_at` and `now`, never negative.
    pub fn elapsed_ms(started_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let delta = now.signed_duration_since(started_at);
        let ms = match delta.num_microseconds() {
            Some(us) => us as f64 / 1000.0,
            None => delta.num_milliseconds() as f64,
        };
        ms.max(0.0)
    }

    /// `true` only when a limit is set and `elapsed_ms` is strictly above it.
    pub fn exceeded(&self, elapsed_ms: f64) -> bool {
        self.limit.millis().is_some_and(|limit| elapsed_ms > limit)
    }
}
