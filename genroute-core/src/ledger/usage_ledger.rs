use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::LedgerConfig;
use crate::error::{GenrouteError, GenrouteResult};
use crate::error_context;
use crate::health::HealthMonitor;
use crate::models::UsageRecord;
use crate::repo::UsageStore;

use super::budget::BudgetGuard;
use super::export::{self, ExportFormat};
use super::stats::UsageStats;

enum PersistCommand {
    Delta { provider: String, cost: f64 },
    Check { provider: String },
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// Bounded log of provider attempts with budget enforcement.
///
/// Each [`record`](Self::record) lands in an in-memory ring buffer, pushes its
/// cost onto a bounded queue drained by a persistence worker, and feeds the
/// health monitor. The worker increments the external counter and deactivates
/// providers whose spend reaches their monthly limit.
pub struct UsageLedger {
    config: LedgerConfig,
    records: RwLock<VecDeque<UsageRecord>>,
    health: HealthMonitor,
    store: Arc<dyn UsageStore>,
    guard: BudgetGuard,
    persist_tx: mpsc::Sender<PersistCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl UsageLedger {
    /// Create the ledger and spawn its persistence worker on the current runtime.
    ///
    /// A zero `capacity` is raised to one so the ring buffer always keeps the
    /// latest record.
    pub fn spawn(
        mut config: LedgerConfig,
        health: HealthMonitor,
        store: Arc<dyn UsageStore>,
        guard: BudgetGuard,
    ) -> Self {
        config.capacity = config.capacity.max(1);
        let (persist_tx, persist_rx) = mpsc::channel(config.persist_queue_capacity.max(1));

        let worker = tokio::spawn(persistence_worker(
            persist_rx,
            store.clone(),
            guard.clone(),
            config.warning_threshold,
        ));

        Self {
            records: RwLock::new(VecDeque::with_capacity(config.capacity.min(4096))),
            config,
            health,
            store,
            guard,
            persist_tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn guard(&self) -> &BudgetGuard {
        &self.guard
    }

    pub fn store(&self) -> &Arc<dyn UsageStore> {
        &self.store
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Append an attempt, queue its cost for persistence and feed health.
    ///
    /// Zero-cost attempts still queue a budget check, so a provider whose
    /// external counter was raised elsewhere is deactivated on its next use.
    pub async fn record(&self, record: UsageRecord) {
        let provider = record.provider.clone();
        let cost = record.cost;
        let success = record.success;
        let latency_ms = record.duration_ms as f64;

        debug!(
            "Recording {} attempt on {}: success={}, cost={:.4}",
            record.task_type, provider, success, cost
        );

        {
            let mut records = self.records.write().await;
            while records.len() >= self.config.capacity {
                records.pop_front();
            }
            records.push_back(record);
        }

        let command = if cost > 0.0 {
            PersistCommand::Delta {
                provider: provider.clone(),
                cost,
            }
        } else {
            PersistCommand::Check {
                provider: provider.clone(),
            }
        };
        match self.persist_tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Usage persistence queue full, dropping {:.4} for {}",
                    cost, provider
                );
            }
            Err(TrySendError::Closed(_)) => {
                error!(
                    "Usage persistence worker stopped, dropping {:.4} for {}",
                    cost, provider
                );
            }
        }

        self.health
            .record_observation(&provider, success, latency_ms)
            .await;
    }

    /// Wait until every cost delta queued before this call has been applied.
    pub async fn flush(&self) -> GenrouteResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.persist_tx
            .send(PersistCommand::Flush(ack_tx))
            .await
            .map_err(|_| {
                GenrouteError::LedgerUnavailable("persistence worker stopped".to_string())
            })?;

        ack_rx.await.map_err(|_| {
            GenrouteError::LedgerUnavailable("persistence worker dropped flush".to_string())
        })
    }

    pub async fn shutdown(&self) {
        if self.persist_tx.send(PersistCommand::Shutdown).await.is_err() {
            debug!("Usage persistence worker already stopped");
        }

        if let Some(worker) = self.worker.lock().await.take() {
            if let Err(e) = worker.await {
                error!("Usage persistence worker ended abnormally: {}", e);
            }
        }
    }

    /// Stats over the last `window_days` days.
    pub async fn stats(&self, provider: Option<&str>, window_days: i64) -> UsageStats {
        let since = Utc::now() - Duration::days(window_days.max(0));
        self.stats_since(provider, since).await
    }

    pub async fn stats_since(&self, provider: Option<&str>, since: DateTime<Utc>) -> UsageStats {
        let records = self.records.read().await;
        UsageStats::from_records(records.iter().filter(|record| {
            record.timestamp >= since && provider.map_or(true, |p| record.provider == p)
        }))
    }

    pub async fn export(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        format: ExportFormat,
    ) -> GenrouteResult<String> {
        if from > to {
            return Err(GenrouteError::ValidationError(format!(
                "export range starts after it ends ({} > {})",
                from, to
            )));
        }

        let selected: Vec<UsageRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.timestamp >= from && record.timestamp <= to)
            .cloned()
            .collect();

        info!("Exporting {} usage records as {}", selected.len(), format);
        export::render(&selected, format)
    }

    /// The newest `limit` records, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<UsageRecord> {
        let records = self.records.read().await;
        let start = records.len().saturating_sub(limit);
        records.iter().skip(start).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Zero the external counters and lift every budget deactivation.
    pub async fn reset_monthly(&self) -> GenrouteResult<()> {
        self.flush().await?;
        self.store.reset_monthly_counters().await?;
        self.guard.clear().await;
        info!("Monthly usage counters reset");
        Ok(())
    }
}

async fn persistence_worker(
    mut rx: mpsc::Receiver<PersistCommand>,
    store: Arc<dyn UsageStore>,
    guard: BudgetGuard,
    warning_threshold: f64,
) {
    debug!("Usage persistence worker started");

    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Delta { provider, cost } => {
                apply_delta(store.as_ref(), &guard, warning_threshold, &provider, cost).await;
            }
            PersistCommand::Check { provider } => {
                check_budget(store.as_ref(), &guard, warning_threshold, &provider).await;
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            PersistCommand::Shutdown => break,
        }
    }

    debug!("Usage persistence worker stopped");
}

async fn apply_delta(
    store: &dyn UsageStore,
    guard: &BudgetGuard,
    warning_threshold: f64,
    provider: &str,
    cost: f64,
) {
    if let Err(e) = store.increment_usage(provider, cost).await {
        e.log_with_context(&error_context!(format!("persist usage for {}", provider)));
        return;
    }

    check_budget(store, guard, warning_threshold, provider).await;
}

async fn check_budget(
    store: &dyn UsageStore,
    guard: &BudgetGuard,
    warning_threshold: f64,
    provider: &str,
) {
    let usage = match store.get_usage(provider).await {
        Ok(Some(usage)) => usage,
        Ok(None) => return,
        Err(e) => {
            e.log_with_context(&error_context!(format!("read usage for {}", provider)));
            return;
        }
    };

    let Some(fraction) = usage.fraction_used() else {
        return;
    };

    if fraction >= 1.0 {
        if let Err(e) = store.set_active(provider, false).await {
            error!("Failed to deactivate {}: {}", provider, e);
        }
        if guard.deactivate(provider).await {
            warn!(
                "Provider {} exceeded its monthly budget ({:.2} of {:.2}), deactivated",
                provider,
                usage.current_usage,
                usage.monthly_limit.unwrap_or_default()
            );
        }
    } else if fraction >= warning_threshold {
        warn!(
            "Provider {} has used {:.0}% of its monthly budget",
            provider,
            fraction * 100.0
        );
    }
}
