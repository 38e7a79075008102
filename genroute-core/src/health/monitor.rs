use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::HealthConfig;
use crate::error::{GenrouteError, GenrouteResult};
use crate::models::HealthRecord;
use crate::providers::{DynGenerationProvider, ProviderClients};

/// Keeps a rolling [`HealthRecord`] per provider.
///
/// Records are fed from two directions: the background probe loop started by
/// [`start`](Self::start), and [`record_observation`](Self::record_observation)
/// which the usage ledger calls for every dispatched attempt. Both paths go
/// through the same EWMA update under the write lock.
#[derive(Clone)]
pub struct HealthMonitor {
    config: HealthConfig,
    clients: Arc<ProviderClients>,
    records: Arc<RwLock<HashMap<String, HealthRecord>>>,
    running: Arc<RwLock<bool>>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HealthMonitor {
    pub fn new(config: HealthConfig, clients: Arc<ProviderClients>) -> Self {
        Self {
            config,
            clients,
            records: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx: Arc::new(Mutex::new(None)),
            handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    pub async fn start(&self) -> GenrouteResult<()> {
        if !self.config.enabled {
            info!("Health probing disabled by configuration");
            return Ok(());
        }

        let mut running = self.running.write().await;
        if *running {
            return Err(GenrouteError::Internal(
                "Health monitor already running".to_string(),
            ));
        }
        *running = true;
        drop(running);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            monitor.background_loop(shutdown_rx).await;
        });
        *self.handle.lock().await = Some(handle);

        info!(
            "Health monitor started: {} providers, interval {}s, first probe in {}s",
            self.clients.len(),
            self.config.probe_interval_secs,
            self.config.startup_delay_secs
        );
        Ok(())
    }

    pub async fn stop(&self) -> GenrouteResult<()> {
        let mut running = self.running.write().await;
        let was_running = *running;
        *running = false;
        drop(running);

        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Health monitor task ended abnormally: {}", e);
            }
        }

        if was_running {
            info!("Health monitor stopped");
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    async fn background_loop(self, mut shutdown_rx: oneshot::Receiver<()>) {
        tokio::select! {
            _ = sleep(self.config.startup_delay()) => {}
            _ = &mut shutdown_rx => {
                debug!("Health monitor stopped before first probe");
                return;
            }
        }

        self.probe_all().await;

        let period = self.config.probe_interval();
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    debug!("Running scheduled health probes");
                    self.probe_all().await;
                }
                _ = &mut shutdown_rx => {
                    info!("Health monitor shutting down");
                    break;
                }
            }
        }
    }

    /// Probe every registered client concurrently and return the updated snapshot.
    pub async fn probe_all(&self) -> Vec<HealthRecord> {
        let probes = self
            .clients
            .iter()
            .map(|(name, client)| self.run_probe(name.clone(), client.clone()));
        join_all(probes).await;

        self.snapshot().await
    }

    pub async fn probe_provider(&self, name: &str) -> GenrouteResult<HealthRecord> {
        let client = self
            .clients
            .get(name)
            .ok_or_else(|| GenrouteError::ProviderNotFound(name.to_string()))?;

        Ok(self.run_probe(name.to_string(), client).await)
    }

    async fn run_probe(&self, name: String, client: DynGenerationProvider) -> HealthRecord {
        let started = Instant::now();

        let success = match timeout(self.config.probe_timeout(), client.test_connection()).await {
            Ok(Ok(healthy)) => {
                if !healthy {
                    debug!("Provider {} reported unhealthy", name);
                }
                healthy
            }
            Ok(Err(e)) => {
                warn!("Health probe for {} failed: {}", name, e);
                false
            }
            Err(_) => {
                warn!(
                    "Health probe for {} timed out after {}s",
                    name, self.config.probe_timeout_secs
                );
                false
            }
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.record_observation(&name, success, latency_ms).await
    }

    /// Apply one observation for `provider`, creating its record on first sight.
    pub async fn record_observation(
        &self,
        provider: &str,
        success: bool,
        latency_ms: f64,
    ) -> HealthRecord {
        let mut records = self.records.write().await;
        let record = records
            .entry(provider.to_string())
            .or_insert_with(|| HealthRecord::new(provider));

        let was_healthy = record.is_healthy;
        record.observe(success, latency_ms, self.config.smoothing_factor);

        if was_healthy && !record.is_healthy {
            warn!(
                "Provider {} marked unhealthy (success rate {:.2})",
                provider, record.success_rate
            );
        } else if !was_healthy && record.is_healthy {
            info!("Provider {} recovered", provider);
        }

        record.clone()
    }

    /// `None` when the provider has never been observed.
    pub async fn is_healthy(&self, provider: &str) -> Option<bool> {
        self.records
            .read()
            .await
            .get(provider)
            .map(|record| record.is_healthy)
    }

    pub async fn get(&self, provider: &str) -> Option<HealthRecord> {
        self.records.read().await.get(provider).cloned()
    }

    pub async fn health_flags(&self) -> HashMap<String, bool> {
        self.records
            .read()
            .await
            .iter()
            .map(|(name, record)| (name.clone(), record.is_healthy))
            .collect()
    }

    /// All records sorted by provider name.
    pub async fn snapshot(&self) -> Vec<HealthRecord> {
        let mut records: Vec<HealthRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.provider.cmp(&b.provider));
        records
    }
}
