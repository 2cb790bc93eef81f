// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::Level;

/// Log level for filtering messages.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log file format options.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration for console and file output.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LogConfig {
    #[serde(default)]
    pub console_enable: bool,
    #[serde(default)]
    pub file_enable: bool,
    #[serde(default)]
    pub console_level: LogLevel,
    #[serde(default)]
    pub file_level: LogLevel,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enable: true,
            file_enable: false,
            console_level: LogLevel::default(),
            file_level: LogLevel::Info,
            file_path: "./logyardd.log".to_string(),
            file_format: LogFormat::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Telemetry and observability configuration (OpenTelemetry metrics export).
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    /// OTLP endpoint for metrics export (e.g., `http://localhost:4318/v1/metrics`).
    /// When unset, metrics are collected locally but not exported.
    pub otlp_endpoint: Option<String>,
    #[serde(default)]
    pub otlp_headers: HashMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enable: true, otlp_endpoint: None, otlp_headers: HashMap::new() }
    }
}

fn default_control_address() -> String {
    "127.0.0.1:4510".to_string()
}

/// The daemon's own HTTP control API, used by the CLI for `add`/`delete`/
/// `list`/`stream` and consulted by nothing else — it only proxies to the
/// config store, which remains the actual source of truth for the running
/// drain set.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_control_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_control_address() }
    }
}

fn default_config_store_path() -> String {
    "/var/lib/logyard/config".to_string()
}

fn default_node_id_path() -> String {
    "/var/lib/logyard/node-id".to_string()
}

/// Node identity and cluster-wide context. `id` and `cluster_endpoint` are
/// normally discovered rather than configured (see `identity::resolve`);
/// setting them here overrides discovery, which is mainly useful for tests
/// and single-node deployments.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NodeConfig {
    pub id: Option<String>,
    /// Path to the file the daemon persists its generated node id in, when
    /// `id` isn't set explicitly. One id per machine, reused across restarts.
    #[serde(default = "default_node_id_path")]
    pub id_path: String,
    /// `host:port` of the shared redis/control node that `stackato-core`
    /// resolves to in redis drain configs. Overrides the config store's
    /// `/cluster/config/endpoint` key when set.
    pub cluster_endpoint: Option<String>,
    /// Root directory of the file-backed configuration store (see
    /// `logyard_store::FileConfigStore`).
    #[serde(default = "default_config_store_path")]
    pub config_store_path: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            id_path: default_node_id_path(),
            cluster_endpoint: None,
            config_store_path: default_config_store_path(),
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_secs() -> u64 {
    30
}

fn default_reset_after_secs() -> u64 {
    5 * 60
}

fn default_budget_secs() -> u64 {
    10 * 60
}

/// Default progressive-retry policy, overridable per-drain-name-prefix via
/// the config store's `retry_limits` subtree.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    #[serde(default = "default_reset_after_secs")]
    pub reset_after_secs: u64,
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            reset_after_secs: default_reset_after_secs(),
            budget_secs: default_budget_secs(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn to_policy(&self) -> logyard_core::retry::RetryPolicy {
        logyard_core::retry::RetryPolicy {
            initial_backoff: std::time::Duration::from_millis(self.initial_backoff_ms),
            max_backoff: std::time::Duration::from_secs(self.max_backoff_secs),
            reset_after: std::time::Duration::from_secs(self.reset_after_secs),
            budget: std::time::Duration::from_secs(self.budget_secs),
        }
    }
}

/// Root configuration for the logyard agent daemon.
#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads the application configuration from defaults, a TOML file, and
/// environment variables (`LOGYARD_SERVER__ADDRESS`, etc.).
///
/// # Errors
///
/// Returns an error if the configuration file exists but contains invalid
/// TOML, or if environment variables are set but contain invalid values.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(figment::providers::Serialized::defaults(Config::default()));

    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }

    let config: Config = figment.merge(Env::prefixed("LOGYARD_").split("__")).extract().map_err(Box::new)?;

    Ok(ConfigLoadResult { config, file_missing })
}

/// Generates the default configuration as a pretty-printed TOML string.
///
/// # Errors
///
/// Returns an error if the default configuration cannot be serialized,
/// which would indicate a programming error.
pub fn generate_default() -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_toml() {
        let toml_str = generate_default().unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.address, default_control_address());
    }

    #[test]
    fn retry_config_converts_to_policy() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy.initial_backoff, std::time::Duration::from_millis(500));
        assert_eq!(policy.budget, std::time::Duration::from_secs(600));
    }
}
