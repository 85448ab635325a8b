use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::fallback::FallbackPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const ENV_PREFIX: &str = "NCP_";
/// Shorthand override for `api.base_url`.
pub const ENV_API_URL: &str = "NCP_API_URL";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub mock_server: MockServerConfig,
}

/// Everything the data access layer needs. Passed in explicitly, never read globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            fallback: FallbackPolicy::default(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Delay before re-reading a node after a live provision ack.
    #[serde(default = "default_provision_refetch_ms")]
    pub provision_refetch_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            provision_refetch_ms: default_provision_refetch_ms(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_provision_refetch_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Pause between simulated provisioning steps.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            step_delay_ms: default_step_delay_ms(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_step_delay_ms() -> u64 {
    2000
}

impl Config {
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(config_dir.join("ncp").join("config.yaml"))
    }

    fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__").ignore(&["API_URL"]));
        if let Ok(url) = std::env::var(ENV_API_URL) {
            figment = figment.merge(Serialized::default("api.base_url", url));
        }
        figment
    }

    /// Defaults, then the YAML file at `path` (if present), then `NCP_*` env vars.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::figment(path)
            .extract()
            .with_context(|| format!("loading configuration ({})", path.display()))
    }
}

/// Resolve the config file (explicit path or the per-user default) and load it.
pub fn load(path: Option<&Path>) -> Result<(Config, PathBuf)> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::path()?,
    };
    let config = Config::load_from(&path)?;
    Ok((config, path))
}
