use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Output format of the log layer.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    #[default]
    Json,
    /// Human readable multi-line output for local development.
    Pretty,
}

/// Settings shared by every service binary.
///
/// Values come from an optional `configuration.{toml,yaml,json}` file and
/// `APP__*` environment variables (`APP__PORT=8080`, `APP__LOG_FORMAT=pretty`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.grpc_port()?;
        Ok(config)
    }

    /// The gRPC listener always sits one port above HTTP. Port 0 stays 0 so
    /// tests can bind both listeners to ephemeral ports.
    pub fn grpc_port(&self) -> Result<u16, AppError> {
        if self.port == 0 {
            return Ok(0);
        }
        self.port.checked_add(1).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "port {} leaves no room for the gRPC listener",
                self.port
            ))
        })
    }
}
