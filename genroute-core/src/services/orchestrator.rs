use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::GenrouteConfig;
use crate::db::{init_database, Database, DatabaseConfig};
use crate::dispatch::{DispatchPipeline, ProgressFn};
use crate::error::GenrouteResult;
use crate::health::HealthMonitor;
use crate::ledger::{BudgetGuard, ExportFormat, UsageLedger, UsageStats};
use crate::models::{DispatchResult, HealthRecord, ProviderUsage, Requirements, WorkUnit};
use crate::providers::{HttpGenerationProvider, ProviderClients};
use crate::registry::CapabilityRegistry;
use crate::repo::{MemoryUsageStore, UsageRepository, UsageStore};
use crate::selector::ProviderSelector;

/// Owns every routing component and exposes the caller-facing operations.
///
/// Build it once, call [`start`](Self::start), and call
/// [`shutdown`](Self::shutdown) before dropping it so the probe loop stops and
/// queued usage reaches the store.
pub struct Orchestrator {
    config: GenrouteConfig,
    registry: Arc<CapabilityRegistry>,
    clients: Arc<ProviderClients>,
    health: HealthMonitor,
    guard: BudgetGuard,
    store: Arc<dyn UsageStore>,
    ledger: Arc<UsageLedger>,
    selector: ProviderSelector,
    pipeline: DispatchPipeline,
    database: Option<Database>,
}

impl Orchestrator {
    /// Wire the components together. Must run inside a tokio runtime since the
    /// ledger's persistence worker is spawned here.
    pub fn new(
        config: GenrouteConfig,
        registry: CapabilityRegistry,
        clients: ProviderClients,
        store: Arc<dyn UsageStore>,
    ) -> Self {
        let registry = Arc::new(registry);
        let clients = Arc::new(clients);
        let guard = BudgetGuard::new();
        let health = HealthMonitor::new(config.health.clone(), clients.clone());

        let ledger = Arc::new(UsageLedger::spawn(
            config.ledger.clone(),
            health.clone(),
            store.clone(),
            guard.clone(),
        ));
        let selector = ProviderSelector::new(registry.clone(), health.clone(), guard.clone());
        let pipeline = DispatchPipeline::new(
            config.dispatch.clone(),
            registry.clone(),
            selector.clone(),
            clients.clone(),
            ledger.clone(),
        );

        Self {
            config,
            registry,
            clients,
            health,
            guard,
            store,
            ledger,
            selector,
            pipeline,
            database: None,
        }
    }

    /// Build from configuration: registry overrides, HTTP endpoints, and the
    /// Postgres usage store when a database url is set.
    pub async fn from_config(config: GenrouteConfig) -> GenrouteResult<Self> {
        let registry = CapabilityRegistry::from_config(&config.registry)?;

        let mut clients = ProviderClients::new();
        for endpoint in &config.providers.endpoints {
            clients.register(Arc::new(HttpGenerationProvider::from_endpoint(endpoint)))?;
        }

        let (store, database): (Arc<dyn UsageStore>, Option<Database>) = if config.uses_database() {
            let db = init_database(&DatabaseConfig::from_settings(&config.database)).await?;
            (Arc::new(UsageRepository::new(db.pool().clone())), Some(db))
        } else {
            debug!("No database configured, keeping usage counters in memory");
            (Arc::new(MemoryUsageStore::new()), None)
        };

        let mut orchestrator = Self::new(config, registry, clients, store);
        orchestrator.database = database;
        Ok(orchestrator)
    }

    /// Seed configured monthly limits and load persisted deactivations.
    pub async fn initialize(&self) -> GenrouteResult<()> {
        info!("Initializing orchestrator");

        for (provider, limit) in &self.config.ledger.monthly_limits {
            if !self.registry.contains(provider) {
                warn!("Monthly limit configured for unknown provider {}", provider);
            }
            self.store.set_monthly_limit(provider, Some(*limit)).await?;
        }

        let usage = self.store.list_usage().await?;
        let deactivated = self.guard.sync_from(&usage).await;
        if deactivated > 0 {
            warn!("{} providers start deactivated for budget", deactivated);
        }

        for name in self.registry.provider_names() {
            if !self.clients.contains(&name) {
                debug!("Provider {} has no client and will be skipped", name);
            }
        }

        Ok(())
    }

    pub async fn start(&self) -> GenrouteResult<()> {
        self.initialize().await?;
        self.health.start().await
    }

    pub async fn shutdown(&self) -> GenrouteResult<()> {
        info!("Shutting down orchestrator");

        self.health.stop().await?;
        if let Err(e) = self.ledger.flush().await {
            e.log();
        }
        self.ledger.shutdown().await;

        if let Some(db) = &self.database {
            db.close().await;
        }
        Ok(())
    }

    pub fn config(&self) -> &GenrouteConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn clients(&self) -> &ProviderClients {
        &self.clients
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    pub fn default_concurrency(&self) -> usize {
        self.pipeline.default_concurrency()
    }

    pub async fn process_all(
        &self,
        units: Vec<WorkUnit>,
        concurrency_limit: usize,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Vec<DispatchResult> {
        self.pipeline
            .process_all(units, concurrency_limit, on_progress)
            .await
    }

    pub async fn retry_failed(
        &self,
        prior: Vec<DispatchResult>,
        concurrency_limit: usize,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Vec<DispatchResult> {
        self.pipeline
            .retry_failed(prior, concurrency_limit, on_progress)
            .await
    }

    pub async fn select_providers(
        &self,
        task_type: &str,
        requirements: &Requirements,
        preferred: Option<&str>,
    ) -> GenrouteResult<Vec<String>> {
        self.selector.select(task_type, requirements, preferred).await
    }

    /// One record per registered provider; unobserved providers show the initial record.
    pub async fn get_health_status(&self) -> Vec<HealthRecord> {
        let mut records = Vec::with_capacity(self.registry.len());
        for name in self.registry.provider_names() {
            let record = self
                .health
                .get(&name)
                .await
                .unwrap_or_else(|| HealthRecord::new(&name));
            records.push(record);
        }
        records.sort_by(|a, b| a.provider.cmp(&b.provider));
        records
    }

    pub async fn check_health_now(&self) -> Vec<HealthRecord> {
        self.health.probe_all().await
    }

    pub async fn get_usage_stats(&self, provider: Option<&str>, days: i64) -> UsageStats {
        self.ledger.stats(provider, days).await
    }

    /// Persisted counters, after draining queued deltas.
    pub async fn get_monthly_usage(&self) -> GenrouteResult<Vec<ProviderUsage>> {
        self.ledger.flush().await?;
        self.store.list_usage().await
    }

    pub async fn export_usage_data(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        format: ExportFormat,
    ) -> GenrouteResult<String> {
        self.ledger.export(from, to, format).await
    }

    pub async fn reset_monthly_usage(&self) -> GenrouteResult<()> {
        self.ledger.reset_monthly().await
    }
}
