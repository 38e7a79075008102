use std::collections::HashMap;

use crate::models::{Capability, ProviderProfile};

use super::DEFAULT_CHAIN;

pub fn builtin_profiles() -> Vec<ProviderProfile> {
    use Capability::*;

    vec![
        ProviderProfile::new("anthropic", 200_000, 0.015)
            .with_capabilities(&[Text, Research, Multimodal]),
        ProviderProfile::new("openai", 128_000, 0.01)
            .with_capabilities(&[Text, Image, Research, Multimodal]),
        ProviderProfile::new("google", 1_000_000, 0.0035)
            .with_capabilities(&[Text, Image, Research, Multimodal]),
        ProviderProfile::new("perplexity", 127_000, 0.005).with_capabilities(&[Text, Research]),
        ProviderProfile::new("stability", 77, 0.04).with_capabilities(&[Image]),
    ]
}

pub fn builtin_chains() -> HashMap<String, Vec<String>> {
    let chains: [(&str, &[&str]); 5] = [
        ("research", &["perplexity", "anthropic", "google", "openai"]),
        ("text", &["anthropic", "openai", "google"]),
        ("image", &["openai", "google", "stability"]),
        ("multimodal", &["google", "openai", "anthropic"]),
        (DEFAULT_CHAIN, &["anthropic", "openai", "google"]),
    ];

    chains
        .iter()
        .map(|(task, providers)| {
            (
                task.to_string(),
                providers.iter().map(|p| p.to_string()).collect(),
            )
        })
        .collect()
}
