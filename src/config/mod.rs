mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./renderforged.toml",
        "./config.toml",
        "~/.config/renderforged/config.toml",
        "/etc/renderforged/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.render.fps == 0 {
        anyhow::bail!("Render fps must be positive");
    }

    if config.render.container.trim().is_empty() {
        anyhow::bail!("Render container extension cannot be empty");
    }

    if !config.media.reference.prefix.starts_with('/') {
        anyhow::bail!(
            "Media prefix must be server-rooted (start with '/'): {}",
            config.media.reference.prefix
        );
    }

    if config.media.metadata_timeout_secs == 0 {
        anyhow::bail!("Metadata timeout cannot be 0");
    }

    if !config.server.public_dir.exists() {
        tracing::warn!("Public directory does not exist: {:?}", config.server.public_dir);
    }

    Ok(())
}
