mod http;

pub use http::HttpGenerationProvider;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GenrouteError, GenrouteResult};
use crate::models::{GenerationOutcome, GenerationRequest};

/// A remote generation backend.
///
/// `generate` may fail in two ways: an `Err` for transport or protocol
/// problems, or an `Ok` outcome with `success == false` when the backend
/// answered but refused the work. Callers treat both as a failed attempt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> GenrouteResult<GenerationOutcome>;

    async fn test_connection(&self) -> GenrouteResult<bool>;
}

pub type DynGenerationProvider = Arc<dyn GenerationProvider>;

/// Registered provider clients keyed by provider name.
#[derive(Clone, Default)]
pub struct ProviderClients {
    clients: HashMap<String, DynGenerationProvider>,
}

impl ProviderClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: DynGenerationProvider) -> GenrouteResult<()> {
        let name = provider.name().to_string();
        if self.clients.contains_key(&name) {
            return Err(GenrouteError::ProviderAlreadyRegistered(name));
        }
        self.clients.insert(name, provider);
        Ok(())
    }

    /// Builder form of [`register`](Self::register); a later client with the same name replaces the earlier one.
    pub fn with(mut self, provider: DynGenerationProvider) -> Self {
        self.clients.insert(provider.name().to_string(), provider);
        self
    }

    pub fn get(&self, name: &str) -> Option<DynGenerationProvider> {
        self.clients.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DynGenerationProvider)> {
        self.clients.iter()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl std::fmt::Debug for ProviderClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClients")
            .field("providers", &self.names())
            .finish()
    }
}
