use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One provider attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub provider: String,
    pub task_type: String,
    pub tokens: u64,
    pub cost: f64,
    pub duration_ms: u64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub model: Option<String>,
    pub error: Option<String>,
}

impl UsageRecord {
    pub fn new(
        provider: impl Into<String>,
        task_type: impl Into<String>,
        success: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            task_type: task_type.into(),
            tokens: 0,
            cost: 0.0,
            duration_ms,
            success,
            timestamp: Utc::now(),
            model: None,
            error: None,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Persisted spend counter for a provider in the current billing month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProviderUsage {
    pub provider: String,
    pub current_usage: f64,
    pub monthly_limit: Option<f64>,
    pub is_active: bool,
}

impl ProviderUsage {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            current_usage: 0.0,
            monthly_limit: None,
            is_active: true,
        }
    }

    pub fn with_limit(mut self, monthly_limit: f64) -> Self {
        self.monthly_limit = Some(monthly_limit);
        self
    }

    /// Fraction of the monthly limit consumed, `None` when unlimited.
    pub fn fraction_used(&self) -> Option<f64> {
        match self.monthly_limit {
            Some(limit) if limit > 0.0 => Some(self.current_usage / limit),
            _ => None,
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.fraction_used().map(|f| f >= 1.0).unwrap_or(false)
    }
}
