use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::provider::{Capability, Requirements};

/// Caller hints forwarded to the provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One independently schedulable piece of generation work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: String,
    pub task_type: String,
    pub prompt: String,
    #[serde(default)]
    pub options: GenerationOptions,
    pub requirements: Requirements,
    #[serde(default)]
    pub preferred_provider: Option<String>,
    /// Only used to correlate results back to the caller's input.
    #[serde(default)]
    pub position: Option<usize>,
}

impl WorkUnit {
    pub fn new(
        id: impl Into<String>,
        task_type: impl Into<String>,
        prompt: impl Into<String>,
        requirements: impl Into<Requirements>,
    ) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            prompt: prompt.into(),
            options: GenerationOptions::default(),
            requirements: requirements.into(),
            preferred_provider: None,
            position: None,
        }
    }

    pub fn image(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, "image", prompt, Capability::Image)
    }

    pub fn text(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(id, "text", prompt, Capability::Text)
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// What a provider receives for a single attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub unit_id: String,
    pub task_type: String,
    pub capability: Capability,
    pub prompt: String,
    pub options: GenerationOptions,
}

impl From<&WorkUnit> for GenerationRequest {
    fn from(unit: &WorkUnit) -> Self {
        Self {
            unit_id: unit.id.clone(),
            task_type: unit.task_type.clone(),
            capability: unit.requirements.capability,
            prompt: unit.prompt.clone(),
            options: unit.options.clone(),
        }
    }
}

/// What a provider hands back for a single attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Billable units (tokens for text, images for image work).
    #[serde(default)]
    pub units_consumed: u64,
}

impl GenerationOutcome {
    pub fn success(artifacts: Vec<String>, model: impl Into<String>) -> Self {
        let units_consumed = artifacts.len().max(1) as u64;
        Self {
            success: true,
            artifacts,
            model: Some(model.into()),
            error: None,
            units_consumed,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            artifacts: Vec::new(),
            model: None,
            error: Some(error.into()),
            units_consumed: 0,
        }
    }

    pub fn with_units(mut self, units: u64) -> Self {
        self.units_consumed = units;
        self
    }
}

/// Final outcome of one work unit for one dispatch pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub unit: WorkUnit,
    pub success: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub artifacts: Vec<String>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub cost: f64,
    pub attempted: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl DispatchResult {
    pub fn succeeded(
        unit: WorkUnit,
        provider: impl Into<String>,
        outcome: GenerationOutcome,
        elapsed_ms: u64,
        cost: f64,
        attempted: Vec<String>,
    ) -> Self {
        Self {
            unit,
            success: true,
            provider: Some(provider.into()),
            model: outcome.model,
            artifacts: outcome.artifacts,
            error: None,
            elapsed_ms,
            cost,
            attempted,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(
        unit: WorkUnit,
        error: impl Into<String>,
        elapsed_ms: u64,
        cost: f64,
        attempted: Vec<String>,
    ) -> Self {
        Self {
            unit,
            success: false,
            provider: None,
            model: None,
            artifacts: Vec::new(),
            error: Some(error.into()),
            elapsed_ms,
            cost,
            attempted,
            completed_at: Utc::now(),
        }
    }

    pub fn unit_id(&self) -> &str {
        &self.unit.id
    }
}
