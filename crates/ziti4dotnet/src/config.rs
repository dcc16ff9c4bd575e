//! Bridge configuration.
//!
//! The managed caller either lets the bridge read its environment or hands
//! over a JSON document through `z4d_init_logging`.

use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "ZITI4DOTNET_LOG";
/// Environment variable selecting `text` or `json` log output.
pub const LOG_FORMAT_ENV: &str = "ZITI4DOTNET_LOG_FORMAT";

/// Output format of the log sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parses a format name (case-insensitive).
    pub fn parse(value: &str) -> BridgeResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(BridgeError::config(
                "log_format",
                format!("unknown format '{}'", other),
            )),
        }
    }
}

/// Runtime configuration of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Include thread ids in log lines.
    pub log_thread_ids: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
            log_thread_ids: true,
        }
    }
}

impl BridgeConfig {
    /// Builds the configuration from `ZITI4DOTNET_*` environment variables.
    pub fn from_env() -> BridgeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::config("json", e.to_string()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> BridgeResult<Self> {
        let mut config = Self::default();
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.log_format = LogFormat::parse(&format)?;
        }
        Ok(config)
    }
}
