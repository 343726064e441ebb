//! Runtime configuration from environment variables.

use crate::error::ConfigError;
use crate::observability::LogFormat;
use crate::reconciliation::ValueErrorPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5222";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// The one origin allowed to call the API from a browser
    pub cors_origin: String,
    /// Account seed file; `None` uses the bundled dataset
    pub accounts_path: Option<PathBuf>,
    /// SQLite file for durable readings; `None` keeps readings in memory
    pub database_path: Option<PathBuf>,
    pub value_errors: ValueErrorPolicy,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5222)),
            cors_origin: DEFAULT_CORS_ORIGIN.to_string(),
            accounts_path: None,
            database_path: None,
            value_errors: ValueErrorPolicy::AbortBatch,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Loads configuration from any variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Config::default();

        if let Some(addr) = get("METER_BIND_ADDR") {
            config.bind_addr = addr.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                var: "METER_BIND_ADDR",
                value: addr.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(origin) = get("METER_CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        config.accounts_path = get("METER_ACCOUNTS_PATH").map(PathBuf::from);
        config.database_path = get("METER_DATABASE_PATH").map(PathBuf::from);

        if let Some(policy) = get("METER_VALUE_ERRORS") {
            config.value_errors = match policy.to_lowercase().as_str() {
                "abort" => ValueErrorPolicy::AbortBatch,
                "skip" => ValueErrorPolicy::SkipRow,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "METER_VALUE_ERRORS",
                        value: policy,
                        reason: "expected `abort` or `skip`".to_string(),
                    })
                }
            };
        }

        if let Some(format) = get("METER_LOG_FORMAT") {
            config.log_format = match format.to_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "METER_LOG_FORMAT",
                        value: format,
                        reason: "expected `pretty` or `json`".to_string(),
                    })
                }
            };
        }

        Ok(config)
    }
}
