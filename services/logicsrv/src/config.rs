//! Service configuration
//!
//! Loaded with figment from a YAML, TOML or JSON file chosen by extension,
//! then overridden by `LOGICSRV_`-prefixed environment variables (`__`
//! separates nested keys, e.g. `LOGICSRV_LOGGING__LEVEL=debug`).

use anyhow::{anyhow, Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use switchlogic_rules::EngineConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "LOGICSRV_";

/// Logging section
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for the daily service log and per-rule logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Write per-rule transition logs under `<dir>/rules/`
    #[serde(default)]
    pub rule_logs: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_loopback() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: None,
            rule_logs: false,
        }
    }
}

/// Complete logicsrv configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogicsrvConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Republish delivered outputs on the bus
    #[serde(default = "default_loopback")]
    pub loopback: bool,

    /// Rule engine settings (`usePut`, `rules`)
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for LogicsrvConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            loopback: default_loopback(),
            engine: EngineConfig::default(),
        }
    }
}

impl LogicsrvConfig {
    /// Directory for per-rule logs, when enabled
    pub fn rule_log_root(&self) -> Option<PathBuf> {
        if !self.logging.rule_logs {
            return None;
        }
        Some(
            self.logging
                .dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("logs")),
        )
    }
}

fn file_provider(path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Config file must have an extension: {}", path.display()))?;

    let figment = match extension {
        "toml" => Figment::new().merge(Toml::file(path)),
        "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
        "json" => Figment::new().merge(Json::file(path)),
        _ => return Err(anyhow!("Unsupported config file format: {}", extension)),
    };
    Ok(figment)
}

/// Load configuration from defaults, an optional file and the environment
pub fn load(path: Option<&Path>) -> Result<LogicsrvConfig> {
    let mut figment = Figment::from(Serialized::defaults(LogicsrvConfig::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        figment = figment.merge(file_provider(path)?);
    }

    figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")
}
