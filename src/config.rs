//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Days of validation history kept by the retention cleanup job
    pub history_retention_days: i32,

    /// Lookback window (days) for the scheduled history population job
    pub history_population_days: i32,

    /// Whether background scheduler tasks are spawned
    pub schedulers_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".into()))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            history_retention_days: env::var("HISTORY_RETENTION_DAYS")
                .unwrap_or_else(|_| "365".into())
                .parse()
                .unwrap_or(365),
            history_population_days: env::var("HISTORY_POPULATION_DAYS")
                .unwrap_or_else(|_| "7".into())
                .parse()
                .unwrap_or(7),
            schedulers_enabled: env::var("SCHEDULERS_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }
}
