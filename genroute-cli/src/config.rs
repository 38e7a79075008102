use anyhow::{anyhow, Context, Result};
use genroute_core::{get_config_dir, GenrouteConfig};
use std::path::{Path, PathBuf};

/// Load configuration from an explicit file, or from the usual search paths.
pub fn load_config(path: Option<&Path>) -> Result<GenrouteConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {}", path.display()));
            }
            GenrouteConfig::load_from_paths(vec![path.to_path_buf()])
        }
        None => GenrouteConfig::load(),
    };

    config.context("Failed to load configuration")
}

pub fn default_config_file() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join("config.toml"))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir =
        get_config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    Ok(config_dir)
}

pub fn render_toml(config: &GenrouteConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration as TOML")
}

pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(proto_end) = url.find("://") {
            let before_auth = &url[..proto_end + 3];
            let after_at = &url[at_pos..];
            if let Some(colon_pos) = url[proto_end + 3..at_pos].find(':') {
                let user = &url[proto_end + 3..proto_end + 3 + colon_pos];
                return format!("{}{}:****{}", before_auth, user, after_at);
            }
        }
    }
    url.to_string()
}
