#![allow(dead_code, clippy::field_reassign_with_default)]

use genroute_core::{
    rank_candidates, Capability, CapabilityRegistry, GenrouteConfig, GenrouteError,
    MemoryUsageStore, Orchestrator, ProviderClients, ProviderProfile, RegistryConfig,
    Requirements, UsageStore,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn test_config() -> GenrouteConfig {
    let mut config = GenrouteConfig::default();
    config.health.enabled = false;
    config
}

fn orchestrator_with_store(store: Arc<MemoryUsageStore>) -> Orchestrator {
    Orchestrator::new(
        test_config(),
        CapabilityRegistry::builtin(),
        ProviderClients::new(),
        store,
    )
}

fn orchestrator() -> Orchestrator {
    orchestrator_with_store(Arc::new(MemoryUsageStore::new()))
}

mod research_routing {
    use super::*;

    #[tokio::test]
    async fn test_research_follows_chain_when_healthy() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers("research", &Requirements::new(Capability::Research), None)
            .await
            .unwrap();

        assert_eq!(ranked, vec!["perplexity", "anthropic", "google", "openai"]);
    }

    #[tokio::test]
    async fn test_unhealthy_provider_drops_out() {
        let orchestrator = orchestrator();
        orchestrator
            .health()
            .record_observation("perplexity", false, 900.0)
            .await;

        let ranked = orchestrator
            .select_providers("research", &Requirements::new(Capability::Research), None)
            .await
            .unwrap();

        assert_eq!(ranked, vec!["anthropic", "google", "openai"]);
    }

    #[tokio::test]
    async fn test_provider_recovers_after_success() {
        let orchestrator = orchestrator();
        let health = orchestrator.health();
        health.record_observation("perplexity", false, 900.0).await;
        health.record_observation("perplexity", true, 150.0).await;

        let ranked = orchestrator
            .select_providers("research", &Requirements::new(Capability::Research), None)
            .await
            .unwrap();

        assert_eq!(ranked[0], "perplexity");
    }

    #[tokio::test]
    async fn test_preferred_provider_goes_first() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers(
                "research",
                &Requirements::new(Capability::Research),
                Some("google"),
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["google", "perplexity", "anthropic", "openai"]);
    }

    #[tokio::test]
    async fn test_unhealthy_preferred_is_not_promoted() {
        let orchestrator = orchestrator();
        orchestrator
            .health()
            .record_observation("google", false, 100.0)
            .await;

        let ranked = orchestrator
            .select_providers(
                "research",
                &Requirements::new(Capability::Research),
                Some("google"),
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["perplexity", "anthropic", "openai"]);
    }

    #[tokio::test]
    async fn test_all_unhealthy_still_returns_chain() {
        let orchestrator = orchestrator();
        for provider in ["perplexity", "anthropic", "google", "openai"] {
            orchestrator
                .health()
                .record_observation(provider, false, 500.0)
                .await;
        }

        let ranked = orchestrator
            .select_providers("research", &Requirements::new(Capability::Research), None)
            .await
            .unwrap();

        assert_eq!(ranked, vec!["perplexity", "anthropic", "google", "openai"]);
    }
}

mod requirements {
    use super::*;

    #[tokio::test]
    async fn test_max_cost_filters_expensive_providers() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers(
                "image",
                &Requirements::new(Capability::Image).with_max_cost(0.02),
                None,
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["openai", "google"]);
    }

    #[tokio::test]
    async fn test_min_tokens_filters_small_contexts() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers(
                "text",
                &Requirements::new(Capability::Text).with_min_tokens(150_000),
                None,
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["anthropic", "google"]);
    }

    #[tokio::test]
    async fn test_impossible_requirements_fail() {
        let orchestrator = orchestrator();

        let err = orchestrator
            .select_providers(
                "text",
                &Requirements::new(Capability::Text).with_min_tokens(5_000_000),
                None,
            )
            .await
            .unwrap_err();

        assert!(err.is_selection_error());
        assert!(matches!(err, GenrouteError::CapabilityMismatch { .. }));
    }

    #[tokio::test]
    async fn test_unknown_task_type_uses_default_chain() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers("poetry", &Requirements::new(Capability::Text), None)
            .await
            .unwrap();

        assert_eq!(ranked, vec!["anthropic", "openai", "google"]);
    }

    #[tokio::test]
    async fn test_chain_order_applies_to_capable_subset() {
        let orchestrator = orchestrator();

        let ranked = orchestrator
            .select_providers(
                "research",
                &Requirements::new(Capability::Image),
                None,
            )
            .await
            .unwrap();

        assert_eq!(ranked, vec!["google", "openai"]);
    }
}

mod budget {
    use super::*;

    #[tokio::test]
    async fn test_over_budget_provider_is_excluded_at_startup() {
        let store = Arc::new(MemoryUsageStore::new());
        store.set_monthly_limit("openai", Some(10.0)).await.unwrap();
        store.increment_usage("openai", 12.0).await.unwrap();

        let orchestrator = orchestrator_with_store(store);
        orchestrator.initialize().await.unwrap();

        let ranked = orchestrator
            .select_providers("image", &Requirements::new(Capability::Image), None)
            .await
            .unwrap();

        assert_eq!(ranked, vec!["google", "stability"]);

        let preferred = orchestrator
            .select_providers("image", &Requirements::new(Capability::Image), Some("openai"))
            .await
            .unwrap();
        assert!(!preferred.contains(&"openai".to_string()));
    }

    #[tokio::test]
    async fn test_every_capable_provider_deactivated_is_a_mismatch() {
        let store = Arc::new(MemoryUsageStore::new());
        for provider in ["openai", "google", "stability"] {
            store.set_active(provider, false).await.unwrap();
        }

        let orchestrator = orchestrator_with_store(store);
        orchestrator.initialize().await.unwrap();

        let err = orchestrator
            .select_providers("image", &Requirements::new(Capability::Image), None)
            .await
            .unwrap_err();
        assert!(err.is_selection_error());
    }
}

mod custom_registry {
    use super::*;

    fn registry() -> CapabilityRegistry {
        let config = RegistryConfig {
            providers: vec![
                ProviderProfile::new("local-llm", 8_000, 0.0).with_capability(Capability::Text),
                ProviderProfile::new("cloud-llm", 128_000, 0.02)
                    .with_capabilities(&[Capability::Text, Capability::Research]),
            ],
            chains: HashMap::from([(
                "text".to_string(),
                vec!["local-llm".to_string(), "cloud-llm".to_string()],
            )]),
        };
        CapabilityRegistry::from_config(&config).unwrap()
    }

    #[test]
    fn test_rank_candidates_with_custom_registry() {
        let registry = registry();

        let ranked = rank_candidates(
            &registry,
            "text",
            &Requirements::new(Capability::Text),
            None,
            &HashMap::new(),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(ranked, vec!["local-llm", "cloud-llm"]);

        let ranked = rank_candidates(
            &registry,
            "text",
            &Requirements::new(Capability::Text).with_min_tokens(32_000),
            None,
            &HashMap::new(),
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(ranked, vec!["cloud-llm"]);
    }

    #[test]
    fn test_rank_candidates_skips_unhealthy_and_deactivated() {
        let registry = registry();
        let health = HashMap::from([("local-llm".to_string(), false)]);

        let ranked = rank_candidates(
            &registry,
            "text",
            &Requirements::new(Capability::Text),
            None,
            &health,
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(ranked, vec!["cloud-llm"]);

        let deactivated = HashSet::from(["cloud-llm".to_string()]);
        let ranked = rank_candidates(
            &registry,
            "text",
            &Requirements::new(Capability::Text),
            None,
            &health,
            &deactivated,
        )
        .unwrap();
        assert_eq!(ranked, vec!["local-llm"]);
    }
}
