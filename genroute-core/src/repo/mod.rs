pub mod memory;
pub mod usage_repo;

pub use memory::MemoryUsageStore;
pub use usage_repo::UsageRepository;

use async_trait::async_trait;

use crate::error::GenrouteResult;
use crate::models::ProviderUsage;

/// Monthly spend counters kept outside the process.
///
/// The ledger's persistence worker is the only writer during normal
/// operation; reads happen on start-up and from reporting commands.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Add `cost` to the provider's running total, creating the row if needed.
    async fn increment_usage(&self, provider: &str, cost: f64) -> GenrouteResult<()>;

    async fn get_usage(&self, provider: &str) -> GenrouteResult<Option<ProviderUsage>>;

    async fn set_active(&self, provider: &str, active: bool) -> GenrouteResult<()>;

    /// Zero every counter and reactivate every provider.
    async fn reset_monthly_counters(&self) -> GenrouteResult<()>;

    async fn set_monthly_limit(&self, provider: &str, limit: Option<f64>) -> GenrouteResult<()>;

    async fn list_usage(&self) -> GenrouteResult<Vec<ProviderUsage>>;
}
