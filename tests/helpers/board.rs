use std::sync::Arc;
use std::time::Duration;

use phoenix_board::adapters::memory::InMemoryCounterStore;
use phoenix_board::adapters::sqlite::SqliteBoardStore;
use phoenix_board::domain::models::{Agent, AgentRegistration, Config, NewTask, Task};
use phoenix_board::services::{BoardCoordinator, HotScoreCalculator, IncentiveLedger, RateLimiter, TaskBoard};
use sqlx::SqlitePool;

pub type TestCoordinator = BoardCoordinator<SqliteBoardStore>;

/// Coordinator over `pool` with an in-memory counter store.
pub fn coordinator(pool: SqlitePool, config: &Config) -> TestCoordinator {
    let limiter = RateLimiter::new(
        Arc::new(InMemoryCounterStore::new()),
        &config.rate_limit,
        &config.counter_store,
    );
    BoardCoordinator::from_config(Arc::new(SqliteBoardStore::new(pool)), limiter, config)
}

/// Coordinator with a custom operation timeout.
pub fn coordinator_with_timeout(pool: SqlitePool, timeout: Duration) -> TestCoordinator {
    let config = Config::default();
    let limiter = RateLimiter::new(
        Arc::new(InMemoryCounterStore::new()),
        &config.rate_limit,
        &config.counter_store,
    );
    BoardCoordinator::new(
        Arc::new(SqliteBoardStore::new(pool)),
        TaskBoard::new(HotScoreCalculator::new(&config.hot_score)),
        IncentiveLedger::new(&config.ledger),
        limiter,
        timeout,
    )
}

pub async fn register(coordinator: &TestCoordinator, codename: &str) -> Agent {
    coordinator
        .register_agent(AgentRegistration::new(codename, "alpha_delta", "data_miner"))
        .await
        .expect("failed to register agent")
        .agent
}

pub async fn post_task(coordinator: &TestCoordinator, title: &str, priority: i32, reward: f64) -> Task {
    coordinator
        .create_task(
            NewTask::new(title, "integration test task", "testing")
                .with_priority(priority)
                .with_reward(reward),
        )
        .await
        .expect("failed to create task")
}
