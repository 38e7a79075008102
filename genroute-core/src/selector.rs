use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GenrouteError, GenrouteResult};
use crate::health::HealthMonitor;
use crate::ledger::BudgetGuard;
use crate::models::Requirements;
use crate::registry::CapabilityRegistry;

/// Turns a task into an ordered list of providers to try.
#[derive(Clone)]
pub struct ProviderSelector {
    registry: Arc<CapabilityRegistry>,
    health: HealthMonitor,
    guard: BudgetGuard,
}

impl ProviderSelector {
    pub fn new(registry: Arc<CapabilityRegistry>, health: HealthMonitor, guard: BudgetGuard) -> Self {
        Self {
            registry,
            health,
            guard,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub async fn select(
        &self,
        task_type: &str,
        requirements: &Requirements,
        preferred: Option<&str>,
    ) -> GenrouteResult<Vec<String>> {
        let health = self.health.health_flags().await;
        let deactivated = self.guard.deactivated().await;

        rank_candidates(
            &self.registry,
            task_type,
            requirements,
            preferred,
            &health,
            &deactivated,
        )
    }
}

/// Candidate ordering from a point-in-time view of health and budget state.
///
/// Chain order is kept as configured; health only removes entries, and only
/// when at least one healthy candidate remains. Providers absent from the
/// health map count as healthy.
pub fn rank_candidates(
    registry: &CapabilityRegistry,
    task_type: &str,
    requirements: &Requirements,
    preferred: Option<&str>,
    health: &HashMap<String, bool>,
    deactivated: &HashSet<String>,
) -> GenrouteResult<Vec<String>> {
    let filtered: Vec<String> = registry
        .providers_matching(requirements)
        .into_iter()
        .filter(|name| !deactivated.contains(name))
        .collect();

    if filtered.is_empty() {
        return Err(GenrouteError::CapabilityMismatch {
            task_type: task_type.to_string(),
            capability: requirements.capability.to_string(),
        });
    }

    let is_unhealthy = |name: &str| health.get(name) == Some(&false);

    let mut pool: Vec<String> = Vec::new();
    for name in registry.chain_for(task_type) {
        if filtered.contains(name) && !pool.contains(name) {
            pool.push(name.clone());
        }
    }

    if pool.is_empty() {
        debug!(
            "Fallback chain for '{}' has no capable members, using registry order",
            task_type
        );
        pool = filtered.clone();
    }

    let healthy: Vec<String> = pool
        .iter()
        .filter(|name| !is_unhealthy(name.as_str()))
        .cloned()
        .collect();

    let mut ordered = if healthy.is_empty() {
        warn!(
            "No healthy provider for '{}', continuing with degraded candidates {:?}",
            task_type, pool
        );
        pool
    } else {
        healthy
    };

    if let Some(preferred) = preferred {
        if filtered.iter().any(|name| name == preferred) && !is_unhealthy(preferred) {
            ordered.retain(|name| name != preferred);
            ordered.insert(0, preferred.to_string());
        } else {
            debug!(
                "Preferred provider {} not usable for '{}', ignoring",
                preferred, task_type
            );
        }
    }

    if ordered.is_empty() {
        return Err(GenrouteError::NoSuitableProvider {
            task_type: task_type.to_string(),
        });
    }

    Ok(ordered)
}
