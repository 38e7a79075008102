#![allow(dead_code, clippy::field_reassign_with_default)]

use async_trait::async_trait;
use genroute_core::{
    CapabilityRegistry, GenerationOutcome, GenerationProvider, GenerationRequest, GenrouteConfig,
    GenrouteResult, MemoryUsageStore, Orchestrator, ProviderClients, WorkUnit,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

struct MockGenerationProvider {
    name: String,
    should_fail: Arc<RwLock<bool>>,
    fail_marker: Option<String>,
    delay: Option<Duration>,
    call_count: Arc<AtomicU32>,
}

impl MockGenerationProvider {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            should_fail: Arc::new(RwLock::new(false)),
            fail_marker: None,
            delay: None,
            call_count: Arc::new(AtomicU32::new(0)),
        }
    }

    fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn set_should_fail(&self, fail: bool) {
        *self.should_fail.write().unwrap() = fail;
    }

    fn get_call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> GenrouteResult<GenerationOutcome> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let marked = self
            .fail_marker
            .as_ref()
            .is_some_and(|m| request.prompt.contains(m.as_str()));
        if *self.should_fail.read().unwrap() || marked {
            return Ok(GenerationOutcome::failure(format!(
                "{} rejected {}",
                self.name, request.unit_id
            )));
        }

        Ok(GenerationOutcome::success(
            vec![format!("{}://{}", self.name, request.unit_id)],
            format!("{}-model", self.name),
        ))
    }

    async fn test_connection(&self) -> GenrouteResult<bool> {
        Ok(!*self.should_fail.read().unwrap())
    }
}

fn test_config() -> GenrouteConfig {
    let mut config = GenrouteConfig::default();
    config.health.enabled = false;
    config.dispatch.retry_backoff_ms = 10;
    config
}

fn orchestrator(config: GenrouteConfig, providers: &[Arc<MockGenerationProvider>]) -> Orchestrator {
    let mut clients = ProviderClients::new();
    for provider in providers {
        clients.register(provider.clone()).unwrap();
    }
    Orchestrator::new(
        config,
        CapabilityRegistry::builtin(),
        clients,
        Arc::new(MemoryUsageStore::new()),
    )
}

fn image_units(count: usize) -> Vec<WorkUnit> {
    (0..count)
        .map(|i| WorkUnit::image(format!("slide-{}", i), format!("illustration {}", i)).with_position(i))
        .collect()
}

mod batching {
    use super::*;

    #[tokio::test]
    async fn test_ten_units_limit_three_reports_each_batch() {
        let openai = Arc::new(MockGenerationProvider::new("openai"));
        let orchestrator = orchestrator(test_config(), &[openai.clone()]);

        let progress = Mutex::new(Vec::new());
        let callback = |done: usize, total: usize| progress.lock().unwrap().push((done, total));

        let results = orchestrator
            .process_all(image_units(10), 3, Some(&callback))
            .await;

        assert_eq!(
            *progress.lock().unwrap(),
            vec![(3, 10), (6, 10), (9, 10), (10, 10)]
        );
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(openai.get_call_count(), 10);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let openai = Arc::new(MockGenerationProvider::new("openai"));
        let orchestrator = orchestrator(test_config(), &[openai]);

        let results = orchestrator.process_all(image_units(7), 4, None).await;

        let ids: Vec<&str> = results.iter().map(|r| r.unit_id()).collect();
        let expected: Vec<String> = (0..7).map(|i| format!("slide-{}", i)).collect();
        assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.unit.position, Some(i));
        }

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty() {
        let orchestrator = orchestrator(test_config(), &[]);

        let calls = AtomicU32::new(0);
        let callback = |_: usize, _: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        let results = orchestrator
            .process_all(Vec::new(), 3, Some(&callback))
            .await;

        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        orchestrator.shutdown().await.unwrap();
    }
}

mod fallback {
    use super::*;

    #[tokio::test]
    async fn test_failing_unit_does_not_affect_others() {
        let openai = Arc::new(MockGenerationProvider::new("openai").failing_on("corrupt"));
        let google = Arc::new(MockGenerationProvider::new("google").failing_on("corrupt"));
        let stability = Arc::new(MockGenerationProvider::new("stability").failing_on("corrupt"));
        let orchestrator = orchestrator(
            test_config(),
            &[openai.clone(), google.clone(), stability.clone()],
        );

        let mut units = image_units(5);
        units[2].prompt = "corrupt prompt".to_string();

        let results = orchestrator.process_all(units, 5, None).await;

        for (i, result) in results.iter().enumerate() {
            if i == 2 {
                assert!(!result.success);
                assert_eq!(result.attempted, vec!["openai", "google", "stability"]);
                let error = result.error.as_deref().unwrap();
                assert!(error.contains("stability rejected slide-2"));
            } else {
                assert!(result.success, "unit {} should succeed", i);
                assert_eq!(result.provider.as_deref(), Some("openai"));
            }
        }

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_falls_back_to_next_in_chain() {
        let openai = Arc::new(MockGenerationProvider::new("openai"));
        openai.set_should_fail(true);
        let google = Arc::new(MockGenerationProvider::new("google"));
        let orchestrator = orchestrator(test_config(), &[openai.clone(), google.clone()]);

        let results = orchestrator.process_all(image_units(1), 1, None).await;
        let result = &results[0];

        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("google"));
        assert_eq!(result.model.as_deref(), Some("google-model"));
        assert_eq!(result.attempted, vec!["openai", "google"]);
        assert!((result.cost - 0.0035).abs() < 1e-9);
        assert_eq!(openai.get_call_count(), 1);

        let health = orchestrator.health().get("openai").await.unwrap();
        assert!(!health.is_healthy);
        assert_eq!(health.consecutive_failures, 1);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_providers_without_clients_are_skipped() {
        let stability = Arc::new(MockGenerationProvider::new("stability"));
        let orchestrator = orchestrator(test_config(), &[stability.clone()]);

        let results = orchestrator.process_all(image_units(2), 2, None).await;

        for result in &results {
            assert!(result.success);
            assert_eq!(result.provider.as_deref(), Some("stability"));
            assert_eq!(result.attempted, vec!["openai", "google", "stability"]);
        }

        let stats = orchestrator.get_usage_stats(None, 1).await;
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.by_provider.len(), 1);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsatisfiable_requirements_fail_without_attempts() {
        let openai = Arc::new(MockGenerationProvider::new("openai"));
        let orchestrator = orchestrator(test_config(), &[openai.clone()]);

        let mut unit = WorkUnit::image("tiny-budget", "a fox");
        unit.requirements.max_cost = Some(0.0001);

        let results = orchestrator.process_all(vec![unit], 1, None).await;

        assert!(!results[0].success);
        assert!(results[0].attempted.is_empty());
        assert_eq!(openai.get_call_count(), 0);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_times_out_and_falls_back() {
        let openai =
            Arc::new(MockGenerationProvider::new("openai").with_delay(Duration::from_secs(600)));
        let google = Arc::new(MockGenerationProvider::new("google"));

        let mut config = test_config();
        config.dispatch.call_timeout_secs = 5;
        let orchestrator = orchestrator(config, &[openai, google]);

        let results = orchestrator.process_all(image_units(1), 1, None).await;

        assert!(results[0].success);
        assert_eq!(results[0].provider.as_deref(), Some("google"));
        assert!(results[0].elapsed_ms >= 5_000);

        let stats = orchestrator.get_usage_stats(Some("openai"), 1).await;
        assert_eq!(stats.failed_requests, 1);

        orchestrator.shutdown().await.unwrap();
    }
}

mod retry {
    use super::*;

    #[tokio::test]
    async fn test_retry_recovers_failed_units() {
        let openai = Arc::new(MockGenerationProvider::new("openai").failing_on("flaky"));
        let google = Arc::new(MockGenerationProvider::new("google").failing_on("flaky"));
        let stability = Arc::new(MockGenerationProvider::new("stability").failing_on("flaky"));
        let orchestrator = orchestrator(test_config(), &[openai.clone(), google, stability]);

        let mut units = image_units(4);
        units[1].prompt = "flaky render".to_string();
        units[3].prompt = "flaky render".to_string();

        let first = orchestrator.process_all(units, 4, None).await;
        assert_eq!(first.iter().filter(|r| !r.success).count(), 2);

        let mut fixed = first.clone();
        for result in fixed.iter_mut().filter(|r| !r.success) {
            result.unit.prompt = "steady render".to_string();
        }

        let retried = orchestrator.retry_failed(fixed, 4, None).await;

        assert!(retried.iter().all(|r| r.success));
        assert_eq!(retried[0], first[0]);
        assert_eq!(retried[2], first[2]);
        assert_eq!(openai.get_call_count(), 6);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_never_regresses() {
        let openai = Arc::new(MockGenerationProvider::new("openai").failing_on("broken"));
        let google = Arc::new(MockGenerationProvider::new("google").failing_on("broken"));
        let stability = Arc::new(MockGenerationProvider::new("stability").failing_on("broken"));
        let orchestrator = orchestrator(test_config(), &[openai, google, stability]);

        let mut units = image_units(3);
        units[0].prompt = "broken".to_string();

        let first = orchestrator.process_all(units, 3, None).await;
        let retried = orchestrator.retry_failed(first.clone(), 3, None).await;

        assert_eq!(retried.len(), first.len());
        for (before, after) in first.iter().zip(&retried) {
            assert_eq!(before.unit_id(), after.unit_id());
            if before.success {
                assert!(after.success);
                assert_eq!(before, after);
            }
        }
        assert!(!retried[0].success);
        assert_eq!(retried[0], first[0]);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_with_no_failures_makes_no_calls() {
        let openai = Arc::new(MockGenerationProvider::new("openai"));
        let orchestrator = orchestrator(test_config(), &[openai.clone()]);

        let first = orchestrator.process_all(image_units(3), 3, None).await;
        let retried = orchestrator.retry_failed(first.clone(), 3, None).await;

        assert_eq!(retried, first);
        assert_eq!(openai.get_call_count(), 3);

        orchestrator.shutdown().await.unwrap();
    }
}
