//! Runtime configuration.
//!
//! Sources are merged in order, later ones overriding earlier ones:
//! 1. [`Config::default`]
//! 2. An optional TOML file
//! 3. `COINSHOP_`-prefixed environment variables (e.g. `COINSHOP_CACHE_CAPACITY=100`)

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::Env;
use figment::providers::Format as _;
use figment::providers::Serialized;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;

use crate::ledger::RetryPolicy;

pub const ENV_PREFIX: &str = "COINSHOP_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Summary cache capacity, 0 disables caching.
    pub cache_capacity: usize,
    pub starting_balance: i64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub operation_timeout_ms: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:coinshop.db".to_owned(),
            max_connections: 8,
            cache_capacity: 10,
            starting_balance: 1000,
            max_attempts: 3,
            retry_backoff_ms: 5,
            operation_timeout_ms: None,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// Loads defaults, then `path` when given, then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `path` does not exist or is not valid TOML.
    /// - A source holds a value of the wrong type.
    /// - The merged values are invalid (see [`Config::validate`]).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::MissingFile(path.display().to_string()));
            }
            figment = figment.merge(Toml::file(path));
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// # Errors
    ///
    /// Returns an error if the figment cannot be extracted or the result is invalid.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if a value is out of its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                reason: "must be at least 1",
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "max_connections",
                reason: "must be at least 1",
            });
        }
        if self.starting_balance < 0 {
            return Err(ConfigError::Invalid {
                field: "starting_balance",
                reason: "must not be negative",
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_backoff_ms))
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config file not found path={0}")]
    MissingFile(String),
    #[error(transparent)]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid config field={field} reason={reason}")]
    Invalid { field: &'static str, reason: &'static str },
}
