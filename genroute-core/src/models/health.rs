use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling health view of a single provider.
///
/// `is_healthy` flips on every observation and is what the selector uses to
/// skip providers. `success_rate` and `average_latency_ms` are exponentially
/// weighted and only move through [`HealthRecord::observe`], so one success
/// after a long run of failures does not reset them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub provider: String,
    pub is_healthy: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

impl HealthRecord {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            is_healthy: true,
            last_checked_at: None,
            consecutive_failures: 0,
            average_latency_ms: 0.0,
            success_rate: 1.0,
        }
    }

    /// Apply one observation with the given smoothing factor (weight of the new sample).
    pub fn observe(&mut self, success: bool, latency_ms: f64, smoothing: f64) {
        let keep = 1.0 - smoothing;

        self.consecutive_failures = if success {
            0
        } else {
            self.consecutive_failures.saturating_add(1)
        };
        self.average_latency_ms = keep * self.average_latency_ms + smoothing * latency_ms;
        self.success_rate =
            keep * self.success_rate + smoothing * if success { 1.0 } else { 0.0 };
        self.is_healthy = success;
        self.last_checked_at = Some(Utc::now());
    }
}
