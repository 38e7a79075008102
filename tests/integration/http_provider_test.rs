#![allow(dead_code, clippy::field_reassign_with_default)]

use genroute_core::{
    EndpointConfig, GenerationProvider, GenerationRequest, GenrouteConfig, GenrouteError, HttpGenerationProvider,
    Orchestrator, WorkUnit,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn endpoint(name: &str, server: &MockServer) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        base_url: server.uri(),
        api_key_env: None,
        model: Some(format!("{}-default", name)),
    }
}

fn config_with(endpoints: Vec<EndpointConfig>) -> GenrouteConfig {
    let mut config = GenrouteConfig::default();
    config.health.enabled = false;
    config.dispatch.retry_backoff_ms = 10;
    config.providers.endpoints = endpoints;
    config
}

async fn mount_success(server: &MockServer, artifact: &str) {
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "artifacts": [artifact],
        })))
        .mount(server)
        .await;
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_through_http_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(serde_json::json!({
                "capability": "image",
                "model": "openai-default"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "artifacts": ["https://cdn.example/a.png", "https://cdn.example/b.png"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let orchestrator = Orchestrator::from_config(config_with(vec![endpoint("openai", &server)]))
            .await
            .unwrap();
        orchestrator.start().await.unwrap();

        let results = orchestrator
            .process_all(vec![WorkUnit::image("cover", "a paper boat")], 1, None)
            .await;

        let result = &results[0];
        assert!(result.success);
        assert_eq!(result.provider.as_deref(), Some("openai"));
        assert_eq!(result.model.as_deref(), Some("openai-default"));
        assert_eq!(result.artifacts.len(), 2);
        assert!((result.cost - 0.02).abs() < 1e-9);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_errors_fall_back_to_next_endpoint() {
        let broken = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&broken)
            .await;

        let working = MockServer::start().await;
        mount_success(&working, "https://cdn.example/ok.png").await;

        let orchestrator = Orchestrator::from_config(config_with(vec![
            endpoint("openai", &broken),
            endpoint("google", &working),
        ]))
        .await
        .unwrap();

        let results = orchestrator
            .process_all(vec![WorkUnit::image("banner", "mountains")], 1, None)
            .await;

        assert!(results[0].success);
        assert_eq!(results[0].provider.as_deref(), Some("google"));
        assert_eq!(results[0].attempted, vec!["openai", "google"]);

        let stats = orchestrator.get_usage_stats(Some("openai"), 1).await;
        assert_eq!(stats.failed_requests, 1);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reported_failure_exhausts_chain() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "content policy"
            })))
            .mount(&server)
            .await;

        let orchestrator = Orchestrator::from_config(config_with(vec![
            endpoint("openai", &server),
            endpoint("google", &server),
            endpoint("stability", &server),
        ]))
        .await
        .unwrap();

        let results = orchestrator
            .process_all(vec![WorkUnit::image("poster", "forbidden")], 1, None)
            .await;

        assert!(!results[0].success);
        assert_eq!(results[0].attempted, vec!["openai", "google", "stability"]);
        let error = results[0].error.as_deref().unwrap();
        assert!(error.contains("E4003"));
        assert!(error.contains("content policy"));

        orchestrator.shutdown().await.unwrap();
    }
}

mod probes {
    use super::*;

    #[tokio::test]
    async fn test_check_health_now_probes_endpoints() {
        let up = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&up)
            .await;

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;

        let orchestrator = Orchestrator::from_config(config_with(vec![
            endpoint("openai", &up),
            endpoint("google", &down),
        ]))
        .await
        .unwrap();

        let probed = orchestrator.check_health_now().await;
        assert_eq!(probed.len(), 2);

        let status = orchestrator.get_health_status().await;
        assert_eq!(status.len(), 5);
        let openai = status.iter().find(|r| r.provider == "openai").unwrap();
        assert!(openai.is_healthy);
        assert!(openai.last_checked_at.is_some());
        let google = status.iter().find(|r| r.provider == "google").unwrap();
        assert!(!google.is_healthy);

        orchestrator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
            .mount(&server)
            .await;

        let provider = HttpGenerationProvider::new("openai", server.uri());
        let request = GenerationRequest::from(&WorkUnit::text("t1", "hello"));
        let err = provider.generate(&request).await.unwrap_err();

        assert!(matches!(
            err,
            GenrouteError::ApiRateLimitExceeded {
                retry_after_secs: 30,
                ..
            }
        ));
        assert!(err.is_transient());
    }
}
