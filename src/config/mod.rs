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

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./clipforge.toml",
        "~/.config/clipforge/config.toml",
        "/etc/clipforge/config.toml",
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
fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.auth.enabled
        && config
            .server
            .auth
            .api_key
            .as_deref()
            .map_or(true, str::is_empty)
    {
        anyhow::bail!("Auth is enabled but no API key is configured");
    }

    if let Some(ref token_file) = config.drive.token_file {
        if !token_file.exists() {
            tracing::warn!("Drive token file does not exist: {:?}", token_file);
        }
    }

    if !Path::new(&config.render.font_path).exists() {
        tracing::warn!(
            "Caption font not found at {}; drawtext will fail if captions are used",
            config.render.font_path
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(!config.server.auth.enabled);
        assert_eq!(config.render.acquire_timeout_secs, 120);
        assert_eq!(config.render.encode_timeout_secs, 600);
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [render]
            font_path = "/fonts/Custom.ttf"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.render.font_path, "/fonts/Custom.ttf");
        assert_eq!(config.render.encode_timeout_secs, 600);
    }

    #[test]
    fn test_auth_requires_api_key() {
        let config: Config = toml::from_str(
            r#"
            [server.auth]
            enabled = true
            "#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }
}
