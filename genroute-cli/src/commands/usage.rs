use clap::Subcommand;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use genroute_core::{GenrouteConfig, ProviderUsage};

use super::{format_cost, format_percent, open_orchestrator};

#[derive(Subcommand)]
pub enum UsageCommand {
    #[command(about = "Show month-to-date spend and limits per provider")]
    Monthly {
        #[arg(
            short,
            long,
            default_value = "text",
            help = "Output format (text, json)"
        )]
        format: String,
    },

    #[command(about = "Zero monthly counters and reactivate every provider")]
    Reset {
        #[arg(short, long, help = "Confirm the reset")]
        yes: bool,
    },

    #[command(about = "Set or clear a provider's monthly limit")]
    Limit {
        #[arg(help = "Provider name")]
        provider: String,

        #[arg(help = "Monthly limit in dollars", conflicts_with = "clear")]
        amount: Option<f64>,

        #[arg(long, help = "Remove the limit")]
        clear: bool,
    },
}

pub async fn handle_usage_command(
    cmd: Option<UsageCommand>,
    config: GenrouteConfig,
) -> anyhow::Result<()> {
    let orchestrator = open_orchestrator(config).await?;

    let result = match cmd.unwrap_or(UsageCommand::Monthly {
        format: "text".to_string(),
    }) {
        UsageCommand::Monthly { format } => match orchestrator.get_monthly_usage().await {
            Ok(usage) => print_monthly(&usage, &format),
            Err(e) => Err(e.into()),
        },
        UsageCommand::Reset { yes } => {
            if yes {
                orchestrator
                    .reset_monthly_usage()
                    .await
                    .map(|_| {
                        println!(
                            "{} {}",
                            "✓".green().bold(),
                            "Monthly usage reset; all providers active".green()
                        );
                    })
                    .map_err(Into::into)
            } else {
                Err(anyhow::anyhow!(
                    "Refusing to reset monthly usage without --yes"
                ))
            }
        }
        UsageCommand::Limit {
            provider,
            amount,
            clear,
        } => {
            if amount.is_none() && !clear {
                Err(anyhow::anyhow!("Pass a limit amount or --clear"))
            } else if matches!(amount, Some(a) if a < 0.0) {
                Err(anyhow::anyhow!("Monthly limit cannot be negative"))
            } else {
                if !orchestrator.registry().contains(&provider) {
                    println!(
                        "{} {} is not in the registry",
                        "!".yellow(),
                        provider
                    );
                }
                orchestrator
                    .ledger()
                    .store()
                    .set_monthly_limit(&provider, amount)
                    .await
                    .map(|_| match amount {
                        Some(a) => println!(
                            "{} Monthly limit for {} set to {}",
                            "✓".green(),
                            provider,
                            format_cost(a)
                        ),
                        None => println!("{} Monthly limit for {} cleared", "✓".green(), provider),
                    })
                    .map_err(Into::into)
            }
        }
    };

    orchestrator.shutdown().await?;
    result
}

fn print_monthly(usage: &[ProviderUsage], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(usage)?);
        return Ok(());
    }

    println!("{}", "Monthly Usage".cyan().bold());
    println!(
        "{}",
        format!("As of {}", chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")).dimmed()
    );
    println!();

    if usage.is_empty() {
        println!("{}", "No usage recorded this month.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Provider").fg(Color::White),
            Cell::new("Spent").fg(Color::White),
            Cell::new("Limit").fg(Color::White),
            Cell::new("Used").fg(Color::White),
            Cell::new("Status").fg(Color::White),
        ]);

    let mut total = 0.0;
    for row in usage {
        total += row.current_usage;

        let limit = row
            .monthly_limit
            .map(format_cost)
            .unwrap_or_else(|| "none".to_string());
        let used = row
            .fraction_used()
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        let status = if row.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("deactivated").fg(Color::Red)
        };

        table.add_row(vec![
            Cell::new(&row.provider).fg(Color::Cyan),
            Cell::new(format_cost(row.current_usage)),
            Cell::new(limit),
            Cell::new(used),
            status,
        ]);
    }

    println!("{table}");
    println!();
    println!("  {:<10} {}", "Total:".bold(), format_cost(total));

    Ok(())
}
