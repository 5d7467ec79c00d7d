use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Require a bearer token on the render API
    #[serde(default)]
    pub enabled: bool,

    /// API key for programmatic access (used with Authorization: Bearer header)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth: AuthConfig::default(),
        }
    }
}

/// Credential source for the authenticated remote-storage channel.
///
/// Resolved once at startup: a readonly-scope access token, either inline or
/// read from a file. When neither is set, acquisition uses the anonymous
/// direct-download endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    /// Font used for caption drawtext nodes
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Timeout for each remote download, in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Timeout for each ffmpeg invocation, in seconds
    #[serde(default = "default_encode_timeout")]
    pub encode_timeout_secs: u64,
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf".to_string()
}
fn default_acquire_timeout() -> u64 {
    120
}
fn default_encode_timeout() -> u64 {
    600
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            acquire_timeout_secs: default_acquire_timeout(),
            encode_timeout_secs: default_encode_timeout(),
        }
    }
}
