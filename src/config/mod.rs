//! Configuration management for the RoundBuy server
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use rust_decimal::Decimal;
use std::env;
use std::time::Duration;
use thiserror::Error;

use crate::fees::FeeSchedule;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Where pickups and wallet ledgers are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

impl StorageBackend {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid storage backend: '{}'. Expected: postgres or memory",
                s
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    /// Server port
    pub port: u16,

    pub storage_backend: StorageBackend,

    /// Database connection URL, required for the postgres backend
    pub database_url: String,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins, comma separated
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for verifying access tokens
    pub jwt_secret: String,

    /// Base URL of the marketplace API serving advertisements and offers
    pub marketplace_api_url: String,

    /// Card gateway; the simulated gateway is used when unset
    pub payment_gateway_url: Option<String>,

    pub payment_gateway_api_key: Option<String>,

    /// Fees applied to newly scheduled pickups
    pub fee_schedule: FeeSchedule,

    /// How often the background auditor reconciles every wallet
    pub ledger_audit_interval: Duration,

    /// Per-request timeout for marketplace and gateway calls
    pub upstream_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let storage_backend = env::var("STORAGE_BACKEND")
            .map(|s| StorageBackend::from_str(&s))
            .unwrap_or(Ok(StorageBackend::Postgres))?;

        let database_url = match (env::var("DATABASE_URL"), storage_backend) {
            (Ok(url), _) => url,
            (Err(_), StorageBackend::Memory) => String::new(),
            (Err(_), StorageBackend::Postgres) => {
                return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
            }
        };

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) => secret,
            Err(_) if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()))
            }
            Err(_) => "development-secret-change-in-production".to_string(),
        };

        let marketplace_api_url = env::var("MARKETPLACE_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api".to_string());

        let payment_gateway_url = env::var("PAYMENT_GATEWAY_URL").ok();
        let payment_gateway_api_key = env::var("PAYMENT_GATEWAY_API_KEY").ok();

        let fee_schedule = FeeSchedule {
            pickup_fee: decimal_var("PICKUP_FEE", "2.00")?,
            safe_service_fee: decimal_var("SAFE_SERVICE_FEE", "1.00")?,
            item_fee_percentage: decimal_var("ITEM_FEE_PERCENTAGE", "0.027")?,
            currency: env::var("CURRENCY")
                .unwrap_or_else(|_| "GBP".to_string())
                .to_uppercase(),
        };
        fee_schedule
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let ledger_audit_interval = positive_secs_var("LEDGER_AUDIT_INTERVAL_SECS", 300)?;
        let upstream_timeout = positive_secs_var("UPSTREAM_TIMEOUT_SECS", 10)?;

        Ok(Config {
            environment,
            port,
            storage_backend,
            database_url,
            db_max_connections,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            marketplace_api_url,
            payment_gateway_url,
            payment_gateway_api_key,
            fee_schedule,
            ledger_audit_interval,
            upstream_timeout,
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

fn decimal_var(name: &str, default: &str) -> Result<Decimal, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} must be a decimal, got '{}'", name, raw)))
}

fn positive_secs_var(name: &str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "{} must be a positive number of seconds, got '{}'",
                    name, raw
                ))
            }),
    }
}
