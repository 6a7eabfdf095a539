//! Configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Prefix for environment overrides, e.g. `PHOENIX_RATE_LIMIT__REQUESTS_PER_MINUTE`.
pub const ENV_PREFIX: &str = "PHOENIX_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `database.path` is blank.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is zero.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// `database.operation_timeout_ms` is zero.
    #[error("Invalid operation_timeout_ms: {0}. Must be positive")]
    InvalidOperationTimeout(u64),

    /// `counter_store.path` is blank.
    #[error("Counter store path cannot be empty")]
    EmptyCounterStorePath,

    /// `counter_store.timeout_ms` is zero.
    #[error("Invalid counter store timeout_ms: {0}. Must be positive")]
    InvalidCounterTimeout(u64),

    /// `rate_limit.requests_per_minute` is zero.
    #[error("Invalid requests_per_minute: {0}. Must be at least 1")]
    InvalidRateLimit(u32),

    /// `rate_limit.window_secs` is zero.
    #[error("Invalid rate limit window_secs: {0}. Must be at least 1")]
    InvalidWindow(u64),

    /// A `ledger` value is negative or not finite.
    #[error("Invalid {name}: {value}. Must be a non-negative number")]
    InvalidLedgerValue {
        /// Offending key.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// A `hot_score` weight is negative or not finite.
    #[error("Invalid hot score weight {name}: {value}. Must be a non-negative number")]
    InvalidHotScoreWeight {
        /// Offending key.
        name: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// Unknown `logging.level`.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .phoenix/config.yaml
    /// 3. .phoenix/local.yaml (optional local overrides)
    /// 4. Environment variables (PHOENIX_* prefix, `__` between sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".phoenix/config.yaml"))
            .merge(Yaml::file(".phoenix/local.yaml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring
    /// environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }
        if config.database.operation_timeout_ms == 0 {
            return Err(ConfigError::InvalidOperationTimeout(config.database.operation_timeout_ms));
        }

        if config.counter_store.path.trim().is_empty() {
            return Err(ConfigError::EmptyCounterStorePath);
        }
        if config.counter_store.timeout_ms == 0 {
            return Err(ConfigError::InvalidCounterTimeout(config.counter_store.timeout_ms));
        }

        if config.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(config.rate_limit.requests_per_minute));
        }
        if config.rate_limit.window_secs == 0 {
            return Err(ConfigError::InvalidWindow(config.rate_limit.window_secs));
        }

        let ledger = &config.ledger;
        for (name, value) in [
            ("claim_bonus", ledger.claim_bonus),
            ("initial_dopamine", ledger.initial_dopamine),
            ("initial_oxytocin", ledger.initial_oxytocin),
            ("initial_adrenaline", ledger.initial_adrenaline),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidLedgerValue { name, value });
            }
        }

        let hot = &config.hot_score;
        for (name, value) in [
            ("priority_weight", hot.priority_weight),
            ("reward_weight", hot.reward_weight),
            ("age_weight_per_hour", hot.age_weight_per_hour),
            ("max_age_bonus", hot.max_age_bonus),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidHotScoreWeight { name, value });
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::{CounterBackend, LogFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.path, ".phoenix/board.db");
        assert_eq!(config.rate_limit.requests_per_minute, 100);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert!((config.ledger.claim_bonus - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.counter_store.backend, CounterBackend::Memory);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
server:
  port: 9000
database:
  path: /custom/board.db
  operation_timeout_ms: 750
counter_store:
  backend: sqlite
  path: /custom/counters.db
rate_limit:
  requests_per_minute: 30
ledger:
  claim_bonus: 0.5
logging:
  level: debug
  format: pretty
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path, "/custom/board.db");
        assert_eq!(config.database.operation_timeout_ms, 750);
        assert_eq!(config.counter_store.backend, CounterBackend::Sqlite);
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert!((config.ledger.claim_bonus - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_unknown_counter_backend_is_rejected() {
        let yaml = "counter_store:\n  backend: redis\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConnections(0))
        ));
    }

    #[test]
    fn test_validate_zero_operation_timeout() {
        let mut config = Config::default();
        config.database.operation_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidOperationTimeout(0))
        ));
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidRateLimit(0))));
    }

    #[test]
    fn test_validate_negative_claim_bonus() {
        let mut config = Config::default();
        config.ledger.claim_bonus = -0.2;
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLedgerValue { name, .. }) => assert_eq!(name, "claim_bonus"),
            other => panic!("Expected InvalidLedgerValue, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_nan_hot_score_weight() {
        let mut config = Config::default();
        config.hot_score.reward_weight = f64::NAN;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidHotScoreWeight { name: "reward_weight", .. })
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rate_limit:\n  requests_per_minute: 40\nlogging:\n  level: warn").unwrap();
        file.flush().unwrap();

        let config = temp_env::with_vars(
            [
                ("PHOENIX_RATE_LIMIT__REQUESTS_PER_MINUTE", Some("50")),
                ("PHOENIX_LEDGER__CLAIM_BONUS", Some("0.3")),
            ],
            || ConfigLoader::load_from_file(file.path()).unwrap(),
        );

        assert_eq!(config.rate_limit.requests_per_minute, 50, "Env should win over file");
        assert_eq!(config.logging.level, "warn", "File value should persist when not overridden");
        assert!((config.ledger.claim_bonus - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_missing_file() {
        assert!(ConfigLoader::load_from_file("/nonexistent/phoenix.yaml").is_err());
    }

    #[test]
    fn test_hierarchical_merging() {
        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(base_file, "server:\n  port: 8100\nlogging:\n  level: info\n  format: json").unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "server:\n  port: 8200\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.server.port, 8200, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, LogFormat::Json, "Base value should persist when not overridden");
    }
}
