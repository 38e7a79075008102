use anyhow::Context;
use clap::Subcommand;
use colored::Colorize;
use genroute_core::GenrouteConfig;
use std::path::PathBuf;

use crate::config::{default_config_file, ensure_config_dir, mask_password, render_toml};

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print the effective configuration as TOML")]
    Show,

    #[command(about = "Write a default config file to the user config directory")]
    Init {
        #[arg(short, long, help = "Overwrite an existing file")]
        force: bool,
    },

    #[command(about = "Print the config file path in use")]
    Path,
}

pub fn handle_config_command(
    cmd: Option<ConfigCommand>,
    config: GenrouteConfig,
    explicit_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    match cmd.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_config_show(config),
        ConfigCommand::Init { force } => cmd_config_init(force),
        ConfigCommand::Path => {
            match explicit_path.or_else(default_config_file) {
                Some(path) => println!("{}", path.display()),
                None => println!("{}", "Could not determine config directory".yellow()),
            }
            Ok(())
        }
    }
}

fn cmd_config_show(mut config: GenrouteConfig) -> anyhow::Result<()> {
    config.database.url = mask_password(&config.database.url);
    print!("{}", render_toml(&config)?);
    Ok(())
}

fn cmd_config_init(force: bool) -> anyhow::Result<()> {
    let path = ensure_config_dir()?.join("config.toml");

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    let rendered = render_toml(&GenrouteConfig::default())?;
    std::fs::write(&path, rendered)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}
