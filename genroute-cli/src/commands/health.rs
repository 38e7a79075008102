use clap::Subcommand;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use genroute_core::{GenrouteConfig, HealthRecord};

use super::{format_percent, open_orchestrator};

#[derive(Subcommand)]
pub enum HealthCommand {
    #[command(about = "Probe every provider with an endpoint and show the results")]
    Check {
        #[arg(short, long, help = "Probe only this provider")]
        provider: Option<String>,

        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Show health records for every registered provider")]
    Status {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },
}

pub async fn handle_health_command(
    cmd: Option<HealthCommand>,
    config: GenrouteConfig,
) -> anyhow::Result<()> {
    let orchestrator = open_orchestrator(config).await?;

    let (records, format) = match cmd.unwrap_or(HealthCommand::Check {
        provider: None,
        format: "text".to_string(),
    }) {
        HealthCommand::Check {
            provider: Some(name),
            format,
        } => {
            let record = orchestrator.health().probe_provider(&name).await;
            orchestrator.shutdown().await?;
            return print_health(&[record?], &format);
        }
        HealthCommand::Check {
            provider: None,
            format,
        } => {
            if orchestrator.clients().is_empty() {
                println!(
                    "{}",
                    "No provider endpoints configured; nothing to probe.".yellow()
                );
            }
            orchestrator.check_health_now().await;
            (orchestrator.get_health_status().await, format)
        }
        HealthCommand::Status { format } => (orchestrator.get_health_status().await, format),
    };

    orchestrator.shutdown().await?;
    print_health(&records, &format)
}

fn print_health(records: &[HealthRecord], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    println!("{}", "Provider Health".cyan().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Provider").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Success Rate").fg(Color::White),
            Cell::new("Avg Latency").fg(Color::White),
            Cell::new("Failures").fg(Color::White),
            Cell::new("Last Checked").fg(Color::White),
        ]);

    for record in records {
        let status = if record.is_healthy {
            Cell::new("healthy").fg(Color::Green)
        } else {
            Cell::new("unhealthy").fg(Color::Red)
        };
        let last_checked = record
            .last_checked_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());

        table.add_row(vec![
            Cell::new(&record.provider).fg(Color::Cyan),
            status,
            Cell::new(format_percent(record.success_rate)),
            Cell::new(format!("{:.0} ms", record.average_latency_ms)),
            Cell::new(record.consecutive_failures),
            Cell::new(last_checked),
        ]);
    }

    println!("{table}");

    let unhealthy = records.iter().filter(|r| !r.is_healthy).count();
    if unhealthy > 0 {
        println!();
        println!(
            "{} {} of {} providers unhealthy",
            "!".yellow(),
            unhealthy,
            records.len()
        );
    }

    Ok(())
}
