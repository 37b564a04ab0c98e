//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::{
    default_cap, default_database_path, default_identity_base, default_metrics_port,
    default_platform_api_base, default_server_id, default_server_label, default_upstream_timeout,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bot identity on the chat platform.
    pub bot: BotConfig,
    /// Webhook and metrics listeners.
    pub listen: ListenConfig,
    /// Guild ids: roles and channels the gate works with.
    pub guild: GuildConfig,
    /// Target server and capacity.
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    /// External identity / allow-list services.
    pub upstream: UpstreamConfig,
    /// Settings database.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Bot credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot token for REST calls.
    pub token: String,
    /// Application id (interaction webhooks are addressed to it).
    pub application_id: String,
    /// Hex-encoded Ed25519 public key used to sign interaction webhooks.
    pub public_key: String,
    /// REST API base URL.
    #[serde(default = "default_platform_api_base")]
    pub api_base: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address for the interaction webhook (e.g., "0.0.0.0:8080").
    pub address: SocketAddr,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Guild-scoped ids.
#[derive(Debug, Clone, Deserialize)]
pub struct GuildConfig {
    /// Guild id.
    pub id: String,
    /// Role granted after a successful verification.
    pub access_role_id: String,
    /// Opt-in role for "applications reopened" notices.
    pub wait_notice_role_id: String,
    /// Role allowed to open and close applications.
    pub admin_role_id: String,
    /// Channel holding the public status message.
    pub status_channel_id: String,
    /// Channel receiving one audit entry per confirmed application.
    pub moderation_log_channel_id: String,
}

/// Target game server and capacity.
#[derive(Debug, Clone, Deserialize)]
pub struct WhitelistConfig {
    /// Allow-list server id applications are filed against.
    #[serde(default = "default_server_id")]
    pub server_id: String,
    /// Display label for the server selector.
    #[serde(default = "default_server_label")]
    pub server_label: String,
    /// Allow-list size at which applications close.
    #[serde(default = "default_cap")]
    pub cap: usize,
    /// Who to contact when something goes wrong (e.g. a user mention).
    #[serde(default)]
    pub contact: Option<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            server_id: default_server_id(),
            server_label: default_server_label(),
            cap: default_cap(),
            contact: None,
        }
    }
}

/// External service endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the account-link / allow-list / violation API.
    pub api_base: String,
    /// Bearer token for the API, if it requires one.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Base URL of the player identity API.
    #[serde(default = "default_identity_base")]
    pub identity_base: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (or ":memory:").
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}
