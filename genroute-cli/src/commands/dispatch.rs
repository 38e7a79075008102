use anyhow::Context;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use genroute_core::{DispatchResult, ExportFormat, GenrouteConfig, UsageStats, WorkUnit};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{format_cost, format_percent, open_orchestrator};

#[derive(Args)]
pub struct DispatchArgs {
    #[arg(help = "JSON file holding an array of work units")]
    pub file: PathBuf,

    #[arg(short = 'n', long, help = "Units in flight per batch (defaults to config)")]
    pub concurrency: Option<usize>,

    #[arg(long, help = "Retry failed units once after the first pass")]
    pub retry: bool,

    #[arg(long, help = "Probe providers before dispatching")]
    pub probe: bool,

    #[arg(long, help = "Print usage statistics for this run")]
    pub stats: bool,

    #[arg(long, help = "Write this run's usage records to a file")]
    pub export: Option<PathBuf>,

    #[arg(
        long,
        default_value = "csv",
        help = "Export format (csv, json)"
    )]
    pub export_format: String,

    #[arg(
        short,
        long,
        default_value = "text",
        help = "Output format (text, json)"
    )]
    pub format: String,
}

pub async fn handle_dispatch_command(
    args: DispatchArgs,
    config: GenrouteConfig,
) -> anyhow::Result<()> {
    let export_format: ExportFormat = args.export_format.parse()?;
    let units = read_units(&args.file)?;
    let quiet = args.format == "json";

    let orchestrator = open_orchestrator(config).await?;
    let concurrency = args
        .concurrency
        .unwrap_or_else(|| orchestrator.default_concurrency());

    if args.probe {
        orchestrator.check_health_now().await;
    }

    if !quiet {
        println!(
            "{} {} units, {} at a time",
            "Dispatching".cyan().bold(),
            units.len(),
            concurrency.max(1)
        );
    }

    let started_at = Utc::now();
    let progress = |done: usize, total: usize| {
        if !quiet {
            println!("  {} {}/{} complete", "→".blue(), done, total);
        }
    };

    let mut results = orchestrator
        .process_all(units, concurrency, Some(&progress))
        .await;

    if args.retry && results.iter().any(|r| !r.success) {
        if !quiet {
            println!("  {} Retrying failed units...", "→".blue());
        }
        results = orchestrator
            .retry_failed(results, concurrency, Some(&progress))
            .await;
    }

    let stats = orchestrator.get_usage_stats(None, 1).await;

    if let Some(path) = &args.export {
        let data = orchestrator
            .export_usage_data(started_at, Utc::now(), export_format)
            .await?;
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write export to {}", path.display()))?;
        if !quiet {
            println!(
                "  {} Exported usage to {}",
                "✓".green(),
                path.display()
            );
        }
    }

    orchestrator.shutdown().await?;

    if quiet {
        let output = serde_json::json!({
            "results": results,
            "stats": if args.stats { Some(&stats) } else { None },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        print_results(&results);
        if args.stats {
            println!();
            print_stats(&stats);
        }
    }

    if results.iter().any(|r| !r.success) {
        anyhow::bail!(
            "{} of {} units failed",
            results.iter().filter(|r| !r.success).count(),
            results.len()
        );
    }

    Ok(())
}

fn read_units(path: &Path) -> anyhow::Result<Vec<WorkUnit>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read work units from {}", path.display()))?;
    let mut units: Vec<WorkUnit> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid work unit file {}", path.display()))?;

    for (i, unit) in units.iter_mut().enumerate() {
        if unit.position.is_none() {
            unit.position = Some(i);
        }
    }
    debug!("Loaded {} work units from {}", units.len(), path.display());
    Ok(units)
}

fn print_results(results: &[DispatchResult]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Unit").fg(Color::White),
            Cell::new("Task").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Provider").fg(Color::White),
            Cell::new("Attempted").fg(Color::White),
            Cell::new("Elapsed").fg(Color::White),
            Cell::new("Cost").fg(Color::White),
        ]);

    for result in results {
        let status = if result.success {
            Cell::new("ok").fg(Color::Green)
        } else {
            Cell::new("failed").fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(result.unit_id()).fg(Color::Cyan),
            Cell::new(&result.unit.task_type),
            status,
            Cell::new(result.provider.as_deref().unwrap_or("-")),
            Cell::new(result.attempted.join(", ")),
            Cell::new(format!("{} ms", result.elapsed_ms)),
            Cell::new(format_cost(result.cost)),
        ]);
    }

    println!("{table}");

    for result in results.iter().filter(|r| !r.success) {
        if let Some(error) = &result.error {
            println!("  {} {}: {}", "✗".red(), result.unit_id(), error);
        }
    }
}

fn print_stats(stats: &UsageStats) {
    println!("{}", "Usage".cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!("  {:<16} {}", "Requests:".bold(), stats.request_count);
    println!(
        "  {:<16} {}",
        "Success rate:".bold(),
        format_percent(stats.success_rate)
    );
    println!("  {:<16} {}", "Total cost:".bold(), format_cost(stats.total_cost));
    println!(
        "  {:<16} {:.0} ms",
        "Avg latency:".bold(),
        stats.average_latency_ms
    );

    if stats.by_provider.is_empty() {
        return;
    }

    println!();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Provider").fg(Color::White),
            Cell::new("Requests").fg(Color::White),
            Cell::new("Failed").fg(Color::White),
            Cell::new("Tokens").fg(Color::White),
            Cell::new("Cost").fg(Color::White),
        ]);

    for (provider, breakdown) in &stats.by_provider {
        table.add_row(vec![
            Cell::new(provider).fg(Color::Cyan),
            Cell::new(breakdown.request_count),
            Cell::new(breakdown.failed_requests()),
            Cell::new(breakdown.total_tokens),
            Cell::new(format_cost(breakdown.total_cost)),
        ]);
    }

    println!("{table}");
}
