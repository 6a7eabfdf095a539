//! Domain models for the task board.

pub mod agent;
pub mod config;
pub mod task;

pub use agent::{
    Agent, AgentRegistration, FibonacciLevel, HormoneLevels, ADRENALINE, DOPAMINE, OXYTOCIN,
};
pub use config::{
    Config, CounterBackend, CounterStoreConfig, DatabaseConfig, HotScoreConfig, LedgerConfig,
    LogFormat, LoggingConfig, RateLimitConfig, RotationPolicy, ServerConfig,
};
pub use task::{NewTask, Task, TaskStatus};
