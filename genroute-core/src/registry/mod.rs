mod builtin;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::error::{GenrouteError, GenrouteResult};
use crate::models::{Capability, ProviderProfile, Requirements};

pub use builtin::{builtin_chains, builtin_profiles};

pub const DEFAULT_CHAIN: &str = "default";

/// Static provider capabilities and per-task fallback chains.
///
/// Built once at start-up and shared behind an `Arc`; nothing here mutates
/// after construction. Names that appear in a chain but not in the profile
/// list are treated as "not capable" rather than rejected.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    profiles: Vec<ProviderProfile>,
    index: HashMap<String, usize>,
    chains: HashMap<String, Vec<String>>,
}

impl CapabilityRegistry {
    pub fn new(
        profiles: Vec<ProviderProfile>,
        chains: HashMap<String, Vec<String>>,
    ) -> GenrouteResult<Self> {
        let mut index = HashMap::with_capacity(profiles.len());
        for (position, profile) in profiles.iter().enumerate() {
            if index.insert(profile.name.clone(), position).is_some() {
                return Err(GenrouteError::ProviderAlreadyRegistered(
                    profile.name.clone(),
                ));
            }
        }

        let mut chains = chains;
        if !chains.contains_key(DEFAULT_CHAIN) {
            let fallback: Vec<String> = profiles.iter().map(|p| p.name.clone()).collect();
            debug!(
                "No default chain configured, using registry order: {:?}",
                fallback
            );
            chains.insert(DEFAULT_CHAIN.to_string(), fallback);
        }

        for (task_type, chain) in &chains {
            for name in chain {
                if !index.contains_key(name) {
                    warn!(
                        "Fallback chain '{}' references unknown provider '{}'",
                        task_type, name
                    );
                }
            }
        }

        Ok(Self {
            profiles,
            index,
            chains,
        })
    }

    pub fn builtin() -> Self {
        let profiles = builtin_profiles();
        let index = profiles
            .iter()
            .enumerate()
            .map(|(position, profile)| (profile.name.clone(), position))
            .collect();

        Self {
            profiles,
            index,
            chains: builtin_chains(),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> GenrouteResult<Self> {
        if config.providers.is_empty() {
            if !config.chains.is_empty() {
                let mut chains = builtin_chains();
                chains.extend(config.chains.clone());
                return Self::new(builtin_profiles(), chains);
            }
            return Ok(Self::builtin());
        }

        Self::new(config.providers.clone(), config.chains.clone())
    }

    pub fn capabilities_of(&self, provider: &str) -> Option<&ProviderProfile> {
        self.index.get(provider).map(|&i| &self.profiles[i])
    }

    pub fn chain_for(&self, task_type: &str) -> &[String] {
        self.chains
            .get(task_type)
            .or_else(|| self.chains.get(DEFAULT_CHAIN))
            .map(|chain| chain.as_slice())
            .unwrap_or(&[])
    }

    /// Names of the providers satisfying `requirements`, in registry order.
    pub fn providers_matching(&self, requirements: &Requirements) -> Vec<String> {
        self.profiles
            .iter()
            .filter(|profile| profile.satisfies(requirements))
            .map(|profile| profile.name.clone())
            .collect()
    }

    pub fn providers_with(&self, capability: Capability) -> Vec<String> {
        self.providers_matching(&Requirements::new(capability))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn profiles(&self) -> &[ProviderProfile] {
        &self.profiles
    }

    /// Chains sorted by task type.
    pub fn chains(&self) -> Vec<(&str, &[String])> {
        let mut chains: Vec<(&str, &[String])> = self
            .chains
            .iter()
            .map(|(task, chain)| (task.as_str(), chain.as_slice()))
            .collect();
        chains.sort_by(|a, b| a.0.cmp(b.0));
        chains
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.index.contains_key(provider)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
