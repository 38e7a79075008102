#![allow(dead_code, clippy::field_reassign_with_default)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use genroute_core::{
    Capability, CapabilityRegistry, ExportFormat, GenerationOutcome, GenerationProvider,
    GenerationRequest, GenrouteConfig, GenrouteResult, MemoryUsageStore, Orchestrator,
    ProviderClients, Requirements, UsageStore, WorkUnit,
};
use std::sync::Arc;

struct FixedCostProvider {
    name: String,
    units: u64,
}

impl FixedCostProvider {
    fn new(name: &str, units: u64) -> Self {
        Self {
            name: name.to_string(),
            units,
        }
    }
}

#[async_trait]
impl GenerationProvider for FixedCostProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> GenrouteResult<GenerationOutcome> {
        Ok(GenerationOutcome::success(
            vec![format!("{}://{}", self.name, request.unit_id)],
            "fixed-v1",
        )
        .with_units(self.units))
    }

    async fn test_connection(&self) -> GenrouteResult<bool> {
        Ok(true)
    }
}

fn test_config() -> GenrouteConfig {
    let mut config = GenrouteConfig::default();
    config.health.enabled = false;
    config
}

fn orchestrator(config: GenrouteConfig, store: Arc<MemoryUsageStore>) -> Orchestrator {
    let clients = ProviderClients::new()
        .with(Arc::new(FixedCostProvider::new("stability", 1)))
        .with(Arc::new(FixedCostProvider::new("anthropic", 100)));
    Orchestrator::new(config, CapabilityRegistry::builtin(), clients, store)
}

fn stability_units(count: usize) -> Vec<WorkUnit> {
    (0..count)
        .map(|i| {
            WorkUnit::image(format!("poster-{}", i), "retro poster")
                .with_preferred_provider("stability")
        })
        .collect()
}

mod budget_enforcement {
    use super::*;

    #[tokio::test]
    async fn test_provider_deactivated_once_limit_reached() {
        let mut config = test_config();
        config
            .ledger
            .monthly_limits
            .insert("stability".to_string(), 0.1);

        let store = Arc::new(MemoryUsageStore::new());
        let orchestrator = orchestrator(config, store.clone());
        orchestrator.initialize().await.unwrap();

        let results = orchestrator.process_all(stability_units(3), 1, None).await;
        assert!(results.iter().all(|r| r.success));

        let monthly = orchestrator.get_monthly_usage().await.unwrap();
        let stability = monthly.iter().find(|u| u.provider == "stability").unwrap();
        assert!((stability.current_usage - 0.12).abs() < 1e-9);
        assert!(!stability.is_active);
        assert!(orchestrator.ledger().guard().is_deactivated("stability").await);

        let ranked = orchestrator
            .select_providers("image", &Requirements::new(Capability::Image), Some("stability"))
            .await
            .unwrap();
        assert_eq!(ranked, vec!["openai", "google"]);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_deactivation_survives_restart() {
        let mut config = test_config();
        config
            .ledger
            .monthly_limits
            .insert("stability".to_string(), 0.05);

        let store = Arc::new(MemoryUsageStore::new());
        let first = orchestrator(config.clone(), store.clone());
        first.initialize().await.unwrap();
        first.process_all(stability_units(2), 2, None).await;
        first.shutdown().await.unwrap();

        let second = orchestrator(config, store.clone());
        second.initialize().await.unwrap();
        assert!(second.ledger().guard().is_deactivated("stability").await);

        second.reset_monthly_usage().await.unwrap();
        assert!(!second.ledger().guard().is_deactivated("stability").await);

        let row = store.get_usage("stability").await.unwrap().unwrap();
        assert_eq!(row.current_usage, 0.0);
        assert!(row.is_active);
        assert_eq!(row.monthly_limit, Some(0.05));

        second.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_warning_threshold_keeps_provider_active() {
        let mut config = test_config();
        config
            .ledger
            .monthly_limits
            .insert("stability".to_string(), 0.1);

        let store = Arc::new(MemoryUsageStore::new());
        let orchestrator = orchestrator(config, store.clone());
        orchestrator.initialize().await.unwrap();

        orchestrator.process_all(stability_units(2), 1, None).await;
        orchestrator.ledger().flush().await.unwrap();

        let row = store.get_usage("stability").await.unwrap().unwrap();
        assert!((row.current_usage - 0.08).abs() < 1e-9);
        assert!(row.is_active);
        assert!(!orchestrator.ledger().guard().is_deactivated("stability").await);

        orchestrator.shutdown().await.unwrap();
    }
}

mod statistics {
    use super::*;

    #[tokio::test]
    async fn test_stats_aggregate_by_provider_and_task() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));

        let mut units = stability_units(2);
        units.push(WorkUnit::text("caption-0", "write a caption"));
        orchestrator.process_all(units, 3, None).await;

        let stats = orchestrator.get_usage_stats(None, 7).await;
        assert_eq!(stats.request_count, 3);
        assert_eq!(stats.successful_requests, 3);
        assert_eq!(stats.total_tokens, 102);
        assert!((stats.total_cost - (0.08 + 1.5)).abs() < 1e-9);
        assert_eq!(stats.by_provider["stability"].request_count, 2);
        assert_eq!(stats.by_provider["anthropic"].total_tokens, 100);
        assert_eq!(stats.by_task["image"].request_count, 2);
        assert_eq!(stats.by_task["text"].request_count, 1);

        let anthropic = orchestrator.get_usage_stats(Some("anthropic"), 7).await;
        assert_eq!(anthropic.request_count, 1);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stats_are_idempotent() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        orchestrator.process_all(stability_units(4), 2, None).await;

        let first = orchestrator.get_usage_stats(None, 1).await;
        let second = orchestrator.get_usage_stats(None, 1).await;
        assert_eq!(first, second);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_ring_buffer_keeps_most_recent() {
        let mut config = test_config();
        config.ledger.capacity = 5;
        let orchestrator = orchestrator(config, Arc::new(MemoryUsageStore::new()));

        orchestrator.process_all(stability_units(8), 3, None).await;

        assert_eq!(orchestrator.ledger().len().await, 5);
        let recent = orchestrator.ledger().recent(10).await;
        assert_eq!(recent.len(), 5);

        let stats = orchestrator.get_usage_stats(None, 1).await;
        assert_eq!(stats.request_count, 5);

        orchestrator.shutdown().await.unwrap();
    }
}

mod health_feed {
    use super::*;

    #[tokio::test]
    async fn test_ewma_converges_after_recovery() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        let health = orchestrator.health();

        for _ in 0..5 {
            health.record_observation("google", false, 2_000.0).await;
        }
        let degraded = health.get("google").await.unwrap();
        assert!(!degraded.is_healthy);
        assert_eq!(degraded.consecutive_failures, 5);
        assert!(degraded.success_rate < 0.6);

        for _ in 0..60 {
            health.record_observation("google", true, 100.0).await;
        }
        let recovered = health.get("google").await.unwrap();
        assert!(recovered.is_healthy);
        assert_eq!(recovered.consecutive_failures, 0);
        assert!(recovered.success_rate > 0.99);
        assert!((recovered.average_latency_ms - 100.0).abs() < 5.0);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_feeds_health() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        orchestrator.process_all(stability_units(1), 1, None).await;

        let status = orchestrator.get_health_status().await;
        let stability = status.iter().find(|r| r.provider == "stability").unwrap();
        assert!(stability.last_checked_at.is_some());
        let openai = status.iter().find(|r| r.provider == "openai").unwrap();
        assert!(openai.last_checked_at.is_none());

        orchestrator.shutdown().await.unwrap();
    }
}

mod export {
    use super::*;

    #[tokio::test]
    async fn test_csv_export_covers_window() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        let from = Utc::now() - Duration::minutes(1);
        orchestrator.process_all(stability_units(3), 3, None).await;
        let to = Utc::now() + Duration::minutes(1);

        let csv = orchestrator
            .export_usage_data(from, to, ExportFormat::Csv)
            .await
            .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id,timestamp,provider"));
        assert!(lines[1..].iter().all(|l| l.contains(",stability,image,")));

        let past = orchestrator
            .export_usage_data(from - Duration::days(2), from - Duration::days(1), ExportFormat::Csv)
            .await
            .unwrap();
        assert_eq!(past.lines().count(), 1);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_json_export_parses() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        orchestrator.process_all(stability_units(2), 2, None).await;

        let json = orchestrator
            .export_usage_data(
                Utc::now() - Duration::hours(1),
                Utc::now() + Duration::hours(1),
                ExportFormat::Json,
            )
            .await
            .unwrap();
        let parsed: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["provider"], "stability");

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_inverted_window_is_rejected() {
        let orchestrator = orchestrator(test_config(), Arc::new(MemoryUsageStore::new()));
        let now = Utc::now();

        let result = orchestrator
            .export_usage_data(now, now - Duration::hours(1), ExportFormat::Json)
            .await;
        assert!(result.is_err());

        orchestrator.shutdown().await.unwrap();
    }
}
