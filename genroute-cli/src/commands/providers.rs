use clap::Subcommand;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use genroute_core::{CapabilityRegistry, GenrouteConfig};

use super::format_cost;

#[derive(Subcommand)]
pub enum ProvidersCommand {
    #[command(about = "List registered providers and their capabilities")]
    List {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Show fallback chains per task type")]
    Chains {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Show details for a single provider")]
    Show {
        #[arg(help = "Provider name")]
        name: String,
    },
}

pub async fn handle_providers_command(
    cmd: Option<ProvidersCommand>,
    config: GenrouteConfig,
) -> anyhow::Result<()> {
    let registry = CapabilityRegistry::from_config(&config.registry)?;
    let configured: Vec<&str> = config
        .providers
        .endpoints
        .iter()
        .map(|e| e.name.as_str())
        .collect();

    match cmd.unwrap_or(ProvidersCommand::List {
        format: "text".to_string(),
    }) {
        ProvidersCommand::List { format } => cmd_providers_list(&registry, &configured, &format),
        ProvidersCommand::Chains { format } => cmd_providers_chains(&registry, &format),
        ProvidersCommand::Show { name } => cmd_providers_show(&registry, &configured, &name),
    }
}

fn cmd_providers_list(
    registry: &CapabilityRegistry,
    configured: &[&str],
    format: &str,
) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(registry.profiles())?);
        return Ok(());
    }

    println!("{}", "Registered Providers".cyan().bold());
    println!();

    if registry.is_empty() {
        println!("{}", "No providers registered.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Provider").fg(Color::White),
            Cell::new("Capabilities").fg(Color::White),
            Cell::new("Max Context").fg(Color::White),
            Cell::new("Cost / Unit").fg(Color::White),
            Cell::new("Endpoint").fg(Color::White),
        ]);

    for profile in registry.profiles() {
        let capabilities = profile
            .capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let endpoint = if configured.contains(&profile.name.as_str()) {
            Cell::new("configured").fg(Color::Green)
        } else {
            Cell::new("none").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(&profile.name).fg(Color::Cyan),
            Cell::new(capabilities),
            Cell::new(profile.max_context_tokens),
            Cell::new(format_cost(profile.cost_per_unit)),
            endpoint,
        ]);
    }

    println!("{table}");
    println!();
    println!(
        "{}",
        format!("{} providers, {} with endpoints", registry.len(), configured.len()).dimmed()
    );

    Ok(())
}

fn cmd_providers_chains(registry: &CapabilityRegistry, format: &str) -> anyhow::Result<()> {
    let chains = registry.chains();

    if format == "json" {
        let output: serde_json::Map<String, serde_json::Value> = chains
            .iter()
            .map(|(task, chain)| (task.to_string(), serde_json::json!(chain)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Fallback Chains".cyan().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Task Type").fg(Color::White),
            Cell::new("Order").fg(Color::White),
        ]);

    for (task, chain) in chains {
        table.add_row(vec![
            Cell::new(task).fg(Color::Cyan),
            Cell::new(chain.join(" → ")),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn cmd_providers_show(
    registry: &CapabilityRegistry,
    configured: &[&str],
    name: &str,
) -> anyhow::Result<()> {
    let profile = registry
        .capabilities_of(name)
        .ok_or_else(|| anyhow::anyhow!("Provider '{}' is not registered", name))?;

    println!("{}", format!("Provider: {}", profile.name).cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!(
        "  {:<16} {}",
        "Capabilities:".bold(),
        profile
            .capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  {:<16} {}",
        "Max context:".bold(),
        profile.max_context_tokens
    );
    println!(
        "  {:<16} {}",
        "Cost per unit:".bold(),
        format_cost(profile.cost_per_unit)
    );
    println!(
        "  {:<16} {}",
        "Endpoint:".bold(),
        if configured.contains(&name) {
            "configured".green()
        } else {
            "none".dimmed()
        }
    );

    let member_of: Vec<&str> = registry
        .chains()
        .into_iter()
        .filter(|(_, chain)| chain.iter().any(|p| p == name))
        .map(|(task, _)| task)
        .collect();
    if !member_of.is_empty() {
        println!("  {:<16} {}", "Chains:".bold(), member_of.join(", "));
    }

    Ok(())
}
