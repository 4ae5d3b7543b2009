//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Moderation policy knobs.
    #[serde(default)]
    pub moderation: ModerationConfig,
    /// Outbound notification configuration.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request-level timeout applied to every API call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Moderation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    /// Default lifetime of a warning when the caller does not supply one.
    #[serde(default = "default_warning_expiry_days")]
    pub warning_expiry_days: i64,
    /// How many times a trust-state recompute is attempted before the
    /// failure is surfaced as a degraded result.
    #[serde(default = "default_recompute_attempts")]
    pub recompute_attempts: u32,
    /// Replacement used by filter rules that have an empty replacement.
    #[serde(default = "default_replacement")]
    pub default_replacement: String,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            warning_expiry_days: default_warning_expiry_days(),
            recompute_attempts: default_recompute_attempts(),
            default_replacement: default_replacement(),
        }
    }
}

/// Which notification transport to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTransportKind {
    /// Drop notifications.
    None,
    /// Write notifications to the log.
    #[default]
    Log,
    /// POST notifications to a webhook.
    Webhook,
}

/// Notification transport configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Transport selection.
    #[serde(default)]
    pub transport: NotificationTransportKind,
    /// Target URL for the webhook transport.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Shared secret used to sign webhook payloads.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_warning_expiry_days() -> i64 {
    30
}

const fn default_recompute_attempts() -> u32 {
    2
}

fn default_replacement() -> String {
    "xxx".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `WARDEN_ENV`)
    /// 3. Environment variables with `WARDEN_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("WARDEN_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
