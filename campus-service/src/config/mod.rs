//! Configuration module for campus-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::codes::{
    AllocationMode, CodeOrdering, DEFAULT_ADMISSION_PREFIX, DEFAULT_EMPLOYEE_PREFIX,
    DEFAULT_REQUEST_PREFIX,
};

#[derive(Debug, Clone)]
pub struct CampusConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub codes: CodeConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Code series settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeConfig {
    pub admission_prefix: String,
    pub employee_prefix: String,
    pub request_prefix: String,
    pub allocation_mode: AllocationMode,
    pub admission_ordering: CodeOrdering,
    /// Attempts per insert of a freshly generated code. 1 means no retry.
    pub insert_max_attempts: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            admission_prefix: DEFAULT_ADMISSION_PREFIX.to_string(),
            employee_prefix: DEFAULT_EMPLOYEE_PREFIX.to_string(),
            request_prefix: DEFAULT_REQUEST_PREFIX.to_string(),
            allocation_mode: AllocationMode::Scan,
            // Unpadded admission numbers stop sorting as text past 9.
            admission_ordering: CodeOrdering::Numeric,
            insert_max_attempts: 1,
        }
    }
}

impl CodeConfig {
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let allocation_mode = match lookup("CODE_ALLOCATION_MODE") {
            Some(raw) => AllocationMode::from_string(&raw).ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "CODE_ALLOCATION_MODE must be 'scan' or 'counter', got '{}'",
                    raw
                ))
            })?,
            None => defaults.allocation_mode,
        };

        let admission_ordering = match lookup("ADMISSION_ORDERING") {
            Some(raw) => CodeOrdering::from_string(&raw).ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "ADMISSION_ORDERING must be 'numeric' or 'lexicographic', got '{}'",
                    raw
                ))
            })?,
            None => defaults.admission_ordering,
        };

        Ok(Self {
            admission_prefix: lookup("ADMISSION_PREFIX").unwrap_or(defaults.admission_prefix),
            employee_prefix: lookup("EMPLOYEE_CODE_PREFIX").unwrap_or(defaults.employee_prefix),
            request_prefix: lookup("REQUEST_NUMBER_PREFIX").unwrap_or(defaults.request_prefix),
            allocation_mode,
            admission_ordering,
            insert_max_attempts: lookup("CODE_INSERT_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.insert_max_attempts),
        })
    }
}

impl CampusConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "campus-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            codes: CodeConfig::from_lookup(|key| env::var(key).ok())?,
        })
    }
}
