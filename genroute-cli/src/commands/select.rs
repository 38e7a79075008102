use clap::Args;
use colored::Colorize;
use genroute_core::{Capability, GenrouteConfig, Requirements};

use super::open_orchestrator;

#[derive(Args)]
pub struct SelectArgs {
    #[arg(help = "Task type used to pick the fallback chain (e.g. image, research)")]
    pub task_type: String,

    #[arg(
        short = 'C',
        long,
        help = "Required capability (text, image, research, multimodal); defaults to the task type"
    )]
    pub capability: Option<String>,

    #[arg(short, long, help = "Preferred provider to try first")]
    pub preferred: Option<String>,

    #[arg(long, help = "Minimum context tokens the provider must accept")]
    pub min_tokens: Option<u32>,

    #[arg(long, help = "Maximum cost per unit")]
    pub max_cost: Option<f64>,

    #[arg(long, help = "Probe providers before selecting")]
    pub probe: bool,

    #[arg(
        short,
        long,
        default_value = "text",
        help = "Output format (text, json)"
    )]
    pub format: String,
}

pub async fn handle_select_command(args: SelectArgs, config: GenrouteConfig) -> anyhow::Result<()> {
    let requirements = build_requirements(&args)?;
    let orchestrator = open_orchestrator(config).await?;

    if args.probe {
        orchestrator.check_health_now().await;
    }

    let result = orchestrator
        .select_providers(&args.task_type, &requirements, args.preferred.as_deref())
        .await;
    orchestrator.shutdown().await?;
    let ranked = result?;

    if args.format == "json" {
        let output = serde_json::json!({
            "task_type": args.task_type,
            "requirements": requirements,
            "preferred": args.preferred,
            "providers": ranked,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} {} ({})",
        "Routing for".cyan().bold(),
        args.task_type.bold(),
        requirements.capability
    );
    println!();
    for (i, provider) in ranked.iter().enumerate() {
        let marker = if i == 0 { "→".green() } else { "·".dimmed() };
        println!("  {} {}. {}", marker, i + 1, provider);
    }

    Ok(())
}

fn build_requirements(args: &SelectArgs) -> anyhow::Result<Requirements> {
    let capability: Capability = args
        .capability
        .as_deref()
        .unwrap_or(&args.task_type)
        .parse()?;

    let mut requirements = Requirements::new(capability);
    if let Some(min_tokens) = args.min_tokens {
        requirements = requirements.with_min_tokens(min_tokens);
    }
    if let Some(max_cost) = args.max_cost {
        requirements = requirements.with_max_cost(max_cost);
    }
    Ok(requirements)
}
