mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variables that override file settings.
pub const ENV_RESTREAMER_URL: &str = "STREAMGATE_RESTREAMER_URL";
pub const ENV_RESTREAMER_USERNAME: &str = "STREAMGATE_RESTREAMER_USERNAME";
pub const ENV_RESTREAMER_PASSWORD: &str = "STREAMGATE_RESTREAMER_PASSWORD";
pub const ENV_API_KEY: &str = "STREAMGATE_API_KEY";
pub const ENV_PORT: &str = "PORT";
pub const ENV_CORS_ORIGINS: &str = "CORS_ORIGINS";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./streamgate.toml",
        "./config.toml",
        "~/.config/streamgate/config.toml",
        "/etc/streamgate/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

/// Overlay deployment settings from the environment.
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(url) = env_value(ENV_RESTREAMER_URL) {
        config.restreamer.url = url;
    }
    if let Some(username) = env_value(ENV_RESTREAMER_USERNAME) {
        config.restreamer.username = username;
    }
    if let Some(password) = env_value(ENV_RESTREAMER_PASSWORD) {
        config.restreamer.password = password;
    }
    if let Some(key) = env_value(ENV_API_KEY) {
        config.server.api_key = Some(key);
    }
    if let Some(port) = env_value(ENV_PORT) {
        config.server.port = port
            .parse()
            .with_context(|| format!("Invalid {ENV_PORT} value: {port:?}"))?;
    }
    if let Some(origins) = env_value(ENV_CORS_ORIGINS) {
        config.server.cors_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
    }
    Ok(())
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate server config
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }
    if config
        .server
        .api_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        anyhow::bail!("Server api_key is set but empty");
    }

    // Validate control plane connection
    let url = url::Url::parse(&config.restreamer.url)
        .with_context(|| format!("Invalid restreamer url: {:?}", config.restreamer.url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Restreamer url must be http or https, got {:?}", url.scheme());
    }
    if !config.restreamer.has_credentials() {
        tracing::warn!("Restreamer credentials are not configured; control plane calls will fail");
    }
    if config.restreamer.timeout_secs == 0 {
        anyhow::bail!("Restreamer timeout_secs must be greater than 0");
    }

    // Validate proxy
    if !config.proxy.public_path.starts_with('/') {
        anyhow::bail!(
            "Proxy public_path must start with '/', got {:?}",
            config.proxy.public_path
        );
    }
    if config.proxy.timeout_secs == 0 {
        anyhow::bail!("Proxy timeout_secs must be greater than 0");
    }
    if config.proxy.max_body_bytes == 0 {
        anyhow::bail!("Proxy max_body_bytes must be greater than 0");
    }

    // Validate rate limit
    if config.rate_limit.max_requests == 0 {
        anyhow::bail!("Rate limit max_requests must be greater than 0");
    }
    if config.rate_limit.window_secs == 0 {
        anyhow::bail!("Rate limit window_secs must be greater than 0");
    }

    Ok(())
}
