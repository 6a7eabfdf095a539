//! Phoenix Task Board - coordination core for competing agents
//!
//! Agents register, tasks are posted with a reward, and agents race to claim
//! them. Exactly one claim per task succeeds. Claims and completions pay out
//! through an incentive ledger in the same transaction as the task
//! transition, and a fail-open rate limiter guards the request surface.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the store ports
//! - **Service Layer** (`services`): task board, ledger, rate limiter and the coordinator
//! - **Adapters** (`adapters`): SQLite and in-memory stores, the HTTP router
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use phoenix_board::adapters::memory::InMemoryCounterStore;
//! use phoenix_board::adapters::sqlite::{initialize_database, SqliteBoardStore};
//! use phoenix_board::services::{BoardCoordinator, RateLimiter};
//! use phoenix_board::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let pool = initialize_database(&config.database).await?;
//!     let limiter = RateLimiter::new(Arc::new(InMemoryCounterStore::new()), &config.rate_limit, &config.counter_store);
//!     let board = BoardCoordinator::from_config(Arc::new(SqliteBoardStore::new(pool)), limiter, &config);
//!     let hot = board.list_hot(10).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Agent, AgentRegistration, Config, DatabaseConfig, HormoneLevels, LoggingConfig, NewTask,
    RateLimitConfig, Task, TaskStatus,
};
pub use domain::ports::{BoardStore, BoardTransaction, CounterStore};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BoardCoordinator, IncentiveLedger, RateLimiter, TaskBoard};
