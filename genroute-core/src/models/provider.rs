use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::GenrouteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Text,
    Image,
    Research,
    Multimodal,
}

impl Capability {
    pub fn all() -> [Capability; 4] {
        [
            Capability::Text,
            Capability::Image,
            Capability::Research,
            Capability::Multimodal,
        ]
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Text => write!(f, "text"),
            Capability::Image => write!(f, "image"),
            Capability::Research => write!(f, "research"),
            Capability::Multimodal => write!(f, "multimodal"),
        }
    }
}

impl FromStr for Capability {
    type Err = GenrouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Capability::Text),
            "image" => Ok(Capability::Image),
            "research" => Ok(Capability::Research),
            "multimodal" | "multi_modal" => Ok(Capability::Multimodal),
            other => Err(GenrouteError::ValidationError(format!(
                "unknown capability '{}'",
                other
            ))),
        }
    }
}

/// Static description of what a provider can do and what it costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub name: String,
    pub capabilities: Vec<Capability>,
    pub max_context_tokens: u32,
    pub cost_per_unit: f64,
}

impl ProviderProfile {
    pub fn new(name: impl Into<String>, max_context_tokens: u32, cost_per_unit: f64) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            max_context_tokens,
            cost_per_unit,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn with_capabilities(mut self, capabilities: &[Capability]) -> Self {
        for capability in capabilities {
            self = self.with_capability(*capability);
        }
        self
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn satisfies(&self, requirements: &Requirements) -> bool {
        if !self.supports(requirements.capability) {
            return false;
        }

        if let Some(min_tokens) = requirements.min_tokens {
            if self.max_context_tokens < min_tokens {
                return false;
            }
        }

        if let Some(max_cost) = requirements.max_cost {
            if self.cost_per_unit > max_cost {
                return false;
            }
        }

        true
    }
}

/// What a unit of work needs from whichever provider ends up serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub capability: Capability,
    #[serde(default)]
    pub min_tokens: Option<u32>,
    #[serde(default)]
    pub max_cost: Option<f64>,
}

impl Requirements {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            min_tokens: None,
            max_cost: None,
        }
    }

    pub fn with_min_tokens(mut self, min_tokens: u32) -> Self {
        self.min_tokens = Some(min_tokens);
        self
    }

    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }
}

impl From<Capability> for Requirements {
    fn from(capability: Capability) -> Self {
        Self::new(capability)
    }
}
