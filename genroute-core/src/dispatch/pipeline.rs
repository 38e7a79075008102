use std::sync::Arc;

use futures::future::join_all;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::GenrouteError;
use crate::ledger::UsageLedger;
use crate::models::{DispatchResult, GenerationOutcome, GenerationRequest, UsageRecord, WorkUnit};
use crate::providers::ProviderClients;
use crate::registry::CapabilityRegistry;
use crate::selector::ProviderSelector;

/// Progress callback, invoked with `(completed, total)` after each batch.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

enum Attempt {
    Succeeded(GenerationOutcome),
    Failed { error: String, units: u64 },
}

/// Runs work units against the selected providers in bounded batches.
pub struct DispatchPipeline {
    config: DispatchConfig,
    registry: Arc<CapabilityRegistry>,
    selector: ProviderSelector,
    clients: Arc<ProviderClients>,
    ledger: Arc<UsageLedger>,
}

impl DispatchPipeline {
    pub fn new(
        config: DispatchConfig,
        registry: Arc<CapabilityRegistry>,
        selector: ProviderSelector,
        clients: Arc<ProviderClients>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            config,
            registry,
            selector,
            clients,
            ledger,
        }
    }

    pub fn default_concurrency(&self) -> usize {
        self.config.concurrency_limit
    }

    /// Dispatch every unit and return one result per unit, in input order.
    ///
    /// Units run in sequential batches of `concurrency_limit` (0 counts as 1);
    /// a batch fully drains before the next one starts. Never fails as a
    /// whole: selection and provider errors become failed results.
    pub async fn process_all(
        &self,
        units: Vec<WorkUnit>,
        concurrency_limit: usize,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Vec<DispatchResult> {
        let total = units.len();
        let batch_size = concurrency_limit.max(1);
        let mut results = Vec::with_capacity(total);

        info!(
            "Dispatching {} work units in batches of {}",
            total, batch_size
        );

        for batch in units.chunks(batch_size) {
            let outcomes = join_all(batch.iter().cloned().map(|unit| self.process_unit(unit))).await;
            results.extend(outcomes);

            if let Some(callback) = on_progress {
                callback(results.len(), total);
            }
        }

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!("{} of {} work units failed", failed, total);
        } else {
            debug!("All {} work units succeeded", total);
        }

        results
    }

    /// Re-run only the failed units of a previous pass after the retry backoff.
    ///
    /// Successful retries replace the prior result at the same position.
    /// Units that fail again keep their earlier result and successful units
    /// are returned untouched.
    pub async fn retry_failed(
        &self,
        prior: Vec<DispatchResult>,
        concurrency_limit: usize,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Vec<DispatchResult> {
        let failed: Vec<(usize, WorkUnit)> = prior
            .iter()
            .enumerate()
            .filter(|(_, result)| !result.success)
            .map(|(index, result)| (index, result.unit.clone()))
            .collect();

        if failed.is_empty() {
            return prior;
        }

        info!(
            "Retrying {} failed work units after {}ms",
            failed.len(),
            self.config.retry_backoff_ms
        );
        sleep(self.config.retry_backoff()).await;

        let (indices, units): (Vec<usize>, Vec<WorkUnit>) = failed.into_iter().unzip();
        let retried = self.process_all(units, concurrency_limit, on_progress).await;

        // process_all keeps input order, so results line up with `indices`
        // even when ids repeat.
        let mut merged = prior;
        let mut recovered = 0;
        for (index, result) in indices.into_iter().zip(retried) {
            if result.success {
                merged[index] = result;
                recovered += 1;
            }
        }

        info!("{} work units recovered on retry", recovered);
        merged
    }

    async fn process_unit(&self, unit: WorkUnit) -> DispatchResult {
        let started = Instant::now();

        let candidates = match self
            .selector
            .select(
                &unit.task_type,
                &unit.requirements,
                unit.preferred_provider.as_deref(),
            )
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("No candidates for unit {}: {}", unit.id, e);
                let elapsed = elapsed_ms(started);
                return DispatchResult::failed(unit, e.to_string(), elapsed, 0.0, Vec::new());
            }
        };

        let request = GenerationRequest::from(&unit);
        let mut attempted = Vec::with_capacity(candidates.len());
        let mut total_cost = 0.0;
        let mut last_error = None;

        for provider in candidates {
            attempted.push(provider.clone());

            let Some(client) = self.clients.get(&provider) else {
                debug!("No client registered for {}, skipping", provider);
                last_error = Some(format!("no client registered for {}", provider));
                continue;
            };

            let attempt_started = Instant::now();
            let attempt = match timeout(self.config.call_timeout(), client.generate(&request)).await {
                Ok(Ok(outcome)) if outcome.success => Attempt::Succeeded(outcome),
                Ok(Ok(outcome)) => Attempt::Failed {
                    error: outcome
                        .error
                        .unwrap_or_else(|| "provider reported failure".to_string()),
                    units: outcome.units_consumed,
                },
                Ok(Err(e)) => Attempt::Failed {
                    error: e.to_string(),
                    units: 0,
                },
                Err(_) => Attempt::Failed {
                    error: GenrouteError::ProviderTimeout {
                        provider: provider.clone(),
                        timeout_secs: self.config.call_timeout_secs,
                    }
                    .to_string(),
                    units: 0,
                },
            };
            let duration_ms = elapsed_ms(attempt_started);

            let cost_per_unit = self
                .registry
                .capabilities_of(&provider)
                .map(|profile| profile.cost_per_unit)
                .unwrap_or(0.0);

            match attempt {
                Attempt::Succeeded(outcome) => {
                    let cost = cost_per_unit * outcome.units_consumed as f64;
                    total_cost += cost;

                    let mut record = UsageRecord::new(&provider, &unit.task_type, true, duration_ms)
                        .with_tokens(outcome.units_consumed)
                        .with_cost(cost);
                    if let Some(model) = &outcome.model {
                        record = record.with_model(model);
                    }
                    self.ledger.record(record).await;

                    debug!(
                        "Unit {} served by {} in {}ms",
                        unit.id, provider, duration_ms
                    );
                    let elapsed = elapsed_ms(started);
                    return DispatchResult::succeeded(
                        unit, provider, outcome, elapsed, total_cost, attempted,
                    );
                }
                Attempt::Failed { error, units } => {
                    let cost = cost_per_unit * units as f64;
                    total_cost += cost;

                    warn!("Unit {} failed on {}: {}", unit.id, provider, error);
                    let record = UsageRecord::new(&provider, &unit.task_type, false, duration_ms)
                        .with_tokens(units)
                        .with_cost(cost)
                        .with_error(&error);
                    self.ledger.record(record).await;
                    last_error = Some(error);
                }
            }
        }

        let exhausted = GenrouteError::FallbackExhausted {
            task_type: unit.task_type.clone(),
            attempted: attempted.clone(),
            last_error,
        };
        let elapsed = elapsed_ms(started);
        DispatchResult::failed(unit, exhausted.to_string(), elapsed, total_cost, attempted)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
