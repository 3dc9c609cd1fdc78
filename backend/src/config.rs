//! Configuration management for the consignment settlement platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with CONSIGN_ prefix

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Settlement workflow tuning
    pub settlement: SettlementConfig,

    /// Receipt artifact storage
    pub receipts: ReceiptConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SettlementConfig {
    /// Commission rate for sellers without one on file
    pub default_commission_rate: Decimal,

    /// How many delete/verify rounds the reconciliation cleanup runs
    pub cleanup_attempts: u32,

    /// What happens to sold-item records when a settlement is reversed
    pub sold_item_policy: SoldItemPolicy,
}

/// Fate of the sold-item ledger when its settlement is deleted
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SoldItemPolicy {
    /// Delete the records together with the settlement
    #[default]
    Purge,
    /// Keep the records for audit, stamped with `voided_at`
    Void,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            default_commission_rate: shared::default_commission_rate(),
            cleanup_attempts: 3,
            sold_item_policy: SoldItemPolicy::Purge,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiptConfig {
    /// Directory receipts are written to
    pub output_dir: String,

    /// Public URL prefix the receipt file name is appended to
    pub public_base_url: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("CONSIGN_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("settlement.default_commission_rate", "0.3")?
            .set_default("settlement.cleanup_attempts", 3)?
            .set_default("settlement.sold_item_policy", "purge")?
            .set_default("receipts.output_dir", "./receipts")?
            .set_default("receipts.public_base_url", "/receipts")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (CONSIGN_ prefix)
            .add_source(
                Environment::with_prefix("CONSIGN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        shared::validate_commission_rate(self.settlement.default_commission_rate)
            .map_err(|msg| ConfigError::Message(format!("settlement.default_commission_rate: {}", msg)))?;

        if self.settlement.cleanup_attempts == 0 {
            return Err(ConfigError::Message(
                "settlement.cleanup_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
