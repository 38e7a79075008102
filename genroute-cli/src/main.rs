#![allow(clippy::too_many_arguments, clippy::field_reassign_with_default)]

use clap::{Parser, Subcommand};
use colored::Colorize;
use genroute_core::{CliErrorDisplay, GenrouteConfig, GenrouteError, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{
    handle_config_command, handle_dispatch_command, handle_health_command,
    handle_providers_command, handle_select_command, handle_usage_command, ConfigCommand,
    DispatchArgs, HealthCommand, ProvidersCommand, SelectArgs, UsageCommand,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

#[derive(Parser)]
#[command(name = "genroute")]
#[command(author = "Rohit Ghumare <ghumare64@gmail.com>")]
#[command(version = VERSION)]
#[command(about = "Genroute - capability-aware provider routing for generation workloads")]
#[command(long_about = r#"
Genroute picks a generation provider for each unit of work based on what the
unit needs, how healthy each provider currently looks, and how much of its
monthly budget each provider has already spent.

Use 'genroute providers' to inspect the registry, 'genroute select' to preview
a routing decision, and 'genroute dispatch' to run a batch of work units.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true, help = "Path to a TOML config file")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Inspect registered providers and fallback chains")]
    Providers {
        #[command(subcommand)]
        action: Option<ProvidersCommand>,
    },

    #[command(about = "Preview the ranked providers for a task type")]
    Select(SelectArgs),

    #[command(about = "Probe providers and show health records")]
    Health {
        #[command(subcommand)]
        action: Option<HealthCommand>,
    },

    #[command(about = "Run a batch of work units from a JSON file")]
    Dispatch(DispatchArgs),

    #[command(about = "Inspect and manage monthly provider spend")]
    Usage {
        #[command(subcommand)]
        action: Option<UsageCommand>,
    },

    #[command(about = "Show or initialize configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommand>,
    },

    #[command(about = "Show version information")]
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose, &config.logging);

    match run(cli, config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<GenrouteError>() {
        Some(err) => eprint!("{}: {}", "Error".red().bold(), CliErrorDisplay::new(err)),
        None => eprintln!("{}: {:#}", "Error".red().bold(), e),
    }
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&logging.level))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let json_layer = logging
        .json_format
        .then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!logging.json_format).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();
}

async fn run(cli: Cli, config: GenrouteConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Providers { action } => handle_providers_command(action, config).await,
        Commands::Select(args) => handle_select_command(args, config).await,
        Commands::Health { action } => handle_health_command(action, config).await,
        Commands::Dispatch(args) => handle_dispatch_command(args, config).await,
        Commands::Usage { action } => handle_usage_command(action, config).await,
        Commands::Config { action } => handle_config_command(action, config, cli.config),
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
            Ok(())
        }
    }
}
