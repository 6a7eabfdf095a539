//! Configuration model, deserialized from YAML files and environment overrides.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure for the task board
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable state store configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Rate limiter counter store configuration
    #[serde(default)]
    pub counter_store: CounterStoreConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Incentive ledger constants
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Hot score weights
    #[serde(default)]
    pub hot_score: HotScoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Send permissive CORS headers.
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_true(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long to wait for a pooled connection
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Upper bound on any single board operation, transaction included
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// How long `SQLite` waits on a locked database before failing
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_database_path() -> String {
    ".phoenix/board.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_acquire_timeout_ms() -> u64 {
    3000
}

const fn default_operation_timeout_ms() -> u64 {
    5000
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Backend holding rate limiter counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterBackend {
    /// Process-local map; counters reset on restart
    Memory,
    /// SQLite file shared by every process pointed at it
    Sqlite,
}

impl Default for CounterBackend {
    fn default() -> Self {
        Self::Memory
    }
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CounterStoreConfig {
    /// Where counters live.
    #[serde(default)]
    pub backend: CounterBackend,

    /// Database file for the sqlite backend
    #[serde(default = "default_counter_path")]
    pub path: String,

    /// Per-call budget before a counter operation counts as failed
    #[serde(default = "default_counter_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_counter_path() -> String {
    ".phoenix/counters.db".to_string()
}

const fn default_counter_timeout_ms() -> u64 {
    250
}

impl Default for CounterStoreConfig {
    fn default() -> Self {
        Self {
            backend: CounterBackend::default(),
            path: default_counter_path(),
            timeout_ms: default_counter_timeout_ms(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// When false every request is allowed.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per identity and operation in one window
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

const fn default_requests_per_minute() -> u32 {
    100
}

const fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            requests_per_minute: default_requests_per_minute(),
            window_secs: default_window_secs(),
        }
    }
}

/// Incentive ledger constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LedgerConfig {
    /// Dopamine credited on every successful claim
    #[serde(default = "default_claim_bonus")]
    pub claim_bonus: f64,

    /// Starting dopamine for a new agent.
    #[serde(default = "default_initial_level")]
    pub initial_dopamine: f64,

    /// Starting oxytocin for a new agent.
    #[serde(default = "default_initial_level")]
    pub initial_oxytocin: f64,

    /// Starting adrenaline for a new agent.
    #[serde(default = "default_initial_level")]
    pub initial_adrenaline: f64,
}

const fn default_claim_bonus() -> f64 {
    0.2
}

const fn default_initial_level() -> f64 {
    1.0
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            claim_bonus: default_claim_bonus(),
            initial_dopamine: default_initial_level(),
            initial_oxytocin: default_initial_level(),
            initial_adrenaline: default_initial_level(),
        }
    }
}

/// Hot score weights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HotScoreConfig {
    /// Multiplier on task priority.
    #[serde(default = "default_priority_weight")]
    pub priority_weight: f64,

    /// Multiplier on the dopamine reward.
    #[serde(default = "default_reward_weight")]
    pub reward_weight: f64,

    /// Score gained per hour once a task is past the grace period
    #[serde(default = "default_age_weight_per_hour")]
    pub age_weight_per_hour: f64,

    /// Age before the age bonus starts to accrue.
    #[serde(default = "default_age_grace_minutes")]
    pub age_grace_minutes: u64,

    /// Ceiling on the age contribution
    #[serde(default = "default_max_age_bonus")]
    pub max_age_bonus: f64,
}

const fn default_priority_weight() -> f64 {
    1.0
}

const fn default_reward_weight() -> f64 {
    2.0
}

const fn default_age_weight_per_hour() -> f64 {
    0.5
}

const fn default_age_grace_minutes() -> u64 {
    60
}

const fn default_max_age_bonus() -> f64 {
    10.0
}

impl Default for HotScoreConfig {
    fn default() -> Self {
        Self {
            priority_weight: default_priority_weight(),
            reward_weight: default_reward_weight(),
            age_weight_per_hour: default_age_weight_per_hour(),
            age_grace_minutes: default_age_grace_minutes(),
            max_age_bonus: default_max_age_bonus(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable multi-line output
    Pretty,
}

/// Rotation policy for the optional log file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file each day
    Daily,
    /// New file each hour
    Hourly,
    /// Single file
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for rolling JSON log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Rotation for files under `log_dir`.
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
