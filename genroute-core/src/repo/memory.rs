use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::GenrouteResult;
use crate::models::ProviderUsage;

use super::UsageStore;

/// Process-local [`UsageStore`], used when no database is configured and in tests.
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    rows: RwLock<BTreeMap<String, ProviderUsage>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits<I, S>(limits: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let rows = limits
            .into_iter()
            .map(|(provider, limit)| {
                let provider = provider.into();
                (provider.clone(), ProviderUsage::new(provider).with_limit(limit))
            })
            .collect();

        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn increment_usage(&self, provider: &str, cost: f64) -> GenrouteResult<()> {
        let mut rows = self.rows.write().await;
        rows.entry(provider.to_string())
            .or_insert_with(|| ProviderUsage::new(provider))
            .current_usage += cost;
        Ok(())
    }

    async fn get_usage(&self, provider: &str) -> GenrouteResult<Option<ProviderUsage>> {
        Ok(self.rows.read().await.get(provider).cloned())
    }

    async fn set_active(&self, provider: &str, active: bool) -> GenrouteResult<()> {
        let mut rows = self.rows.write().await;
        rows.entry(provider.to_string())
            .or_insert_with(|| ProviderUsage::new(provider))
            .is_active = active;
        Ok(())
    }

    async fn reset_monthly_counters(&self) -> GenrouteResult<()> {
        let mut rows = self.rows.write().await;
        for usage in rows.values_mut() {
            usage.current_usage = 0.0;
            usage.is_active = true;
        }
        Ok(())
    }

    async fn set_monthly_limit(&self, provider: &str, limit: Option<f64>) -> GenrouteResult<()> {
        let mut rows = self.rows.write().await;
        rows.entry(provider.to_string())
            .or_insert_with(|| ProviderUsage::new(provider))
            .monthly_limit = limit;
        Ok(())
    }

    async fn list_usage(&self) -> GenrouteResult<Vec<ProviderUsage>> {
        Ok(self.rows.read().await.values().cloned().collect())
    }
}
