//! Configuration module for inventory-service.

use backoffice_core::config as core_config;
use backoffice_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Empty disables capability enforcement (upstream gateway is trusted).
    pub auth_service_endpoint: String,
}

impl InventoryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "inventory-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
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
            auth: AuthConfig {
                auth_service_endpoint: env::var("AUTH_SERVICE_ENDPOINT").unwrap_or_default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn from_env_requires_database_url() {
        let saved = env::var("DATABASE_URL").ok();
        env::remove_var("DATABASE_URL");

        let result = InventoryConfig::from_env();
        assert!(matches!(result, Err(AppError::ConfigError(_))));

        if let Some(url) = saved {
            env::set_var("DATABASE_URL", url);
        }
    }

    #[test]
    #[serial]
    fn from_env_applies_pool_defaults() {
        let saved = env::var("DATABASE_URL").ok();
        env::set_var("DATABASE_URL", "postgres://localhost/backoffice");
        env::remove_var("DATABASE_MAX_CONNECTIONS");
        env::remove_var("DATABASE_MIN_CONNECTIONS");
        env::remove_var("SERVICE_NAME");

        let config = InventoryConfig::from_env().expect("config should load");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.min_connections, 2);
        assert_eq!(config.service_name, "inventory-service");

        match saved {
            Some(url) => env::set_var("DATABASE_URL", url),
            None => env::remove_var("DATABASE_URL"),
        }
    }
}
