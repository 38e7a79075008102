use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::UsageRecord;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageBreakdown {
    pub request_count: u64,
    pub successful_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

impl UsageBreakdown {
    pub fn add(&mut self, record: &UsageRecord) {
        self.request_count += 1;
        if record.success {
            self.successful_requests += 1;
        }
        self.total_tokens += record.tokens;
        self.total_cost += record.cost;
        self.total_duration_ms += record.duration_ms;

        self.average_latency_ms = self.total_duration_ms as f64 / self.request_count as f64;
        self.success_rate = self.successful_requests as f64 / self.request_count as f64;
    }

    pub fn failed_requests(&self) -> u64 {
        self.request_count - self.successful_requests
    }
}

/// Aggregate view over a slice of the ledger.
///
/// Breakdowns use ordered maps so two calls over the same records serialize
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub request_count: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
    pub by_provider: BTreeMap<String, UsageBreakdown>,
    pub by_task: BTreeMap<String, UsageBreakdown>,
}

impl UsageStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        let mut overall = UsageBreakdown::default();
        let mut by_provider: BTreeMap<String, UsageBreakdown> = BTreeMap::new();
        let mut by_task: BTreeMap<String, UsageBreakdown> = BTreeMap::new();

        for record in records {
            overall.add(record);
            by_provider
                .entry(record.provider.clone())
                .or_default()
                .add(record);
            by_task
                .entry(record.task_type.clone())
                .or_default()
                .add(record);
        }

        Self {
            request_count: overall.request_count,
            successful_requests: overall.successful_requests,
            failed_requests: overall.failed_requests(),
            total_tokens: overall.total_tokens,
            total_cost: overall.total_cost,
            average_latency_ms: overall.average_latency_ms,
            success_rate: overall.success_rate,
            by_provider,
            by_task,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.request_count == 0
    }
}
