use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EndpointConfig;
use crate::error::{GenrouteError, GenrouteResult};
use crate::models::{GenerationOptions, GenerationOutcome, GenerationRequest};

use super::GenerationProvider;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Generation backend reached over a small JSON contract:
/// `POST {base_url}/generate` answers with a [`GenerationOutcome`] body and
/// `GET {base_url}/health` answers 2xx when the backend is usable.
pub struct HttpGenerationProvider {
    name: String,
    base_url: String,
    client: Client,
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    unit_id: &'a str,
    task_type: &'a str,
    capability: String,
    prompt: &'a str,
    options: &'a GenerationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl HttpGenerationProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            api_key: None,
            model: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn from_endpoint(endpoint: &EndpointConfig) -> Self {
        let mut provider = Self::new(&endpoint.name, &endpoint.base_url);

        if let Some(var) = &endpoint.api_key_env {
            match std::env::var(var) {
                Ok(key) => provider.api_key = Some(key),
                Err(_) => warn!(
                    "API key variable {} for provider {} is not set",
                    var, endpoint.name
                ),
            }
        }

        provider.model = endpoint.model.clone();
        provider
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    fn status_error(&self, status: StatusCode, retry_after: Option<u64>, body: String) -> GenrouteError {
        match status.as_u16() {
            429 => GenrouteError::ApiRateLimitExceeded {
                provider: self.name.clone(),
                retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            401 | 403 => GenrouteError::ApiAuthenticationFailed {
                provider: self.name.clone(),
                message: status.to_string(),
            },
            500..=599 => GenrouteError::ApiServiceUnavailable(format!(
                "{} returned {}: {}",
                self.name, status, body
            )),
            _ => GenrouteError::provider_call_failed(
                &self.name,
                format!("HTTP {}: {}", status, body),
            ),
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> GenrouteResult<GenerationOutcome> {
        let url = format!("{}/generate", self.base_url);
        let body = GenerateBody {
            unit_id: &request.unit_id,
            task_type: &request.task_type,
            capability: request.capability.to_string(),
            prompt: &request.prompt,
            options: &request.options,
            model: self.model.as_deref(),
        };

        debug!("POST {} for unit {}", url, request.unit_id);

        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| GenrouteError::provider_call_failed(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, retry_after, text));
        }

        let mut outcome: GenerationOutcome = response
            .json()
            .await
            .map_err(|e| GenrouteError::ApiParseError(format!("{}: {}", self.name, e)))?;

        if outcome.model.is_none() {
            outcome.model = self.model.clone();
        }
        if outcome.success && outcome.units_consumed == 0 {
            outcome.units_consumed = outcome.artifacts.len().max(1) as u64;
        }

        Ok(outcome)
    }

    async fn test_connection(&self) -> GenrouteResult<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.authorize(self.client.get(&url)).send().await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                debug!("Health request to {} failed: {}", self.name, e);
                Ok(false)
            }
        }
    }
}
