use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Storage backend selected for the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
    Oracle,
}

impl FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageType::Memory),
            "sqlite" => Ok(StorageType::Sqlite),
            "postgres" => Ok(StorageType::Postgres),
            "mysql" => Ok(StorageType::Mysql),
            "mssql" => Ok(StorageType::Mssql),
            "oracle" => Ok(StorageType::Oracle),
            other => Err(Error::validation("storage.type", format!("unknown backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracingConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XdsConfig {
    pub host: String,
    pub port: u16,
}

impl Default for XdsConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 18000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyServerConfig {
    pub port: u16,
}

impl Default for PolicyServerConfig {
    fn default() -> Self {
        Self { port: 18001 }
    }
}

/// Control-plane configuration.
///
/// Values come from an optional config file parsed by the admin wrapper and
/// are then overridden from the environment with variables of shape
/// `GATEWAY_<SECTION>_<KEY>` (e.g. `GATEWAY_LOGGING_LEVEL`,
/// `GATEWAY_STORAGE_TYPE`, `GATEWAY_POLICYSERVER_PORT`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub xds: XdsConfig,
    #[serde(default)]
    pub policy_server: PolicyServerConfig,
}

impl GatewayConfig {
    /// Build a configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `GATEWAY_<SECTION>_<KEY>` overrides on top of whatever the file
    /// provided. Unset variables leave the current value untouched.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(level) = std::env::var("GATEWAY_LOGGING_LEVEL") {
            match level.as_str() {
                "debug" | "info" | "warn" | "error" => self.logging.level = level,
                other => {
                    return Err(Error::validation(
                        "GATEWAY_LOGGING_LEVEL",
                        format!("unknown level '{other}'"),
                    ));
                }
            }
        }
        if let Ok(storage) = std::env::var("GATEWAY_STORAGE_TYPE") {
            self.storage.storage_type = storage.parse()?;
        }
        if let Ok(enabled) = std::env::var("GATEWAY_TRACING_ENABLED") {
            self.tracing.enabled = enabled
                .parse()
                .map_err(|_| Error::validation("GATEWAY_TRACING_ENABLED", "expected true or false"))?;
        }
        if let Ok(port) = std::env::var("GATEWAY_POLICYSERVER_PORT") {
            self.policy_server.port = port
                .parse()
                .map_err(|_| Error::validation("GATEWAY_POLICYSERVER_PORT", "expected an integer"))?;
        }
        if let Ok(host) = std::env::var("GATEWAY_XDS_HOST") {
            self.xds.host = host;
        }
        if let Ok(port) = std::env::var("GATEWAY_XDS_PORT") {
            self.xds.port = port
                .parse()
                .map_err(|_| Error::validation("GATEWAY_XDS_PORT", "expected an integer"))?;
        }
        Ok(())
    }
}
