use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::ProviderUsage;

/// Providers switched off for exceeding their monthly limit.
///
/// Shared between the ledger's persistence worker, which adds to it, and the
/// selector, which excludes its members. Entries only leave through
/// [`clear`](Self::clear) when the monthly counters are reset.
#[derive(Debug, Clone, Default)]
pub struct BudgetGuard {
    deactivated: Arc<RwLock<HashSet<String>>>,
}

impl BudgetGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the provider was not already deactivated.
    pub async fn deactivate(&self, provider: &str) -> bool {
        self.deactivated.write().await.insert(provider.to_string())
    }

    pub async fn is_deactivated(&self, provider: &str) -> bool {
        self.deactivated.read().await.contains(provider)
    }

    pub async fn deactivated(&self) -> HashSet<String> {
        self.deactivated.read().await.clone()
    }

    pub async fn clear(&self) {
        self.deactivated.write().await.clear();
    }

    /// Load persisted state: inactive or over-budget rows are deactivated.
    pub async fn sync_from(&self, usage: &[ProviderUsage]) -> usize {
        let mut deactivated = self.deactivated.write().await;
        for row in usage {
            if !row.is_active || row.is_over_budget() {
                deactivated.insert(row.provider.clone());
            }
        }
        deactivated.len()
    }
}
