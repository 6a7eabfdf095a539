//! Coordination facade.
//!
//! Sequences task board transitions and ledger updates inside one store
//! transaction per operation, bounds every store call with a timeout, and
//! applies the rate limiter before anything is attempted.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, AgentRegistration, Config, NewTask, Task};
use crate::domain::ports::{AgentUpsert, BoardStore, BoardTransaction};
use crate::services::hot_score::HotScoreCalculator;
use crate::services::incentive_ledger::{IncentiveLedger, RewardDelta};
use crate::services::rate_limiter::{RateDecision, RateLimiter};
use crate::services::task_board::{HotTasks, TaskBoard, MAX_HOT_LIMIT};

/// Operations exposed by the coordinator. Each one is rate limited under
/// its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `POST /agents/register`
    RegisterAgent,
    /// `GET /agents`
    ListAgents,
    /// `GET /agents/{id}`
    GetAgent,
    /// `POST /tasks`
    CreateTask,
    /// `GET /tasks/hot`
    ListHot,
    /// `GET /tasks/{id}`
    GetTask,
    /// `POST /tasks/{id}/claim`
    ClaimTask,
    /// `POST /tasks/{id}/complete`
    CompleteTask,
}

impl Operation {
    /// Name used in rate-limit keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterAgent => "register_agent",
            Self::ListAgents => "list_agents",
            Self::GetAgent => "get_agent",
            Self::CreateTask => "create_task",
            Self::ListHot => "list_hot",
            Self::GetTask => "get_task",
            Self::ClaimTask => "claim_task",
            Self::CompleteTask => "complete_task",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    /// The task, now claimed.
    pub task: Task,
    /// The claimant with the bonus applied.
    pub agent: Agent,
    /// Anticipation bonus applied.
    pub reward: RewardDelta,
}

impl ClaimReceipt {
    /// Anticipation bonus credited by this claim.
    pub fn dopamine_boost(&self) -> f64 {
        self.reward.amount
    }

    /// Reward the claimant earns on completing the task.
    pub fn reward_on_completion(&self) -> f64 {
        self.task.dopamine_reward
    }
}

/// A committed completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReceipt {
    /// The task, now complete.
    pub task: Task,
    /// The claimant with the reward applied.
    pub agent: Agent,
    /// Completion reward applied.
    pub reward: RewardDelta,
    /// Completion reward plus the claim bonus already paid for this task.
    pub total_boost: f64,
}

/// Entry point for every board operation.
pub struct BoardCoordinator<S: BoardStore> {
    store: Arc<S>,
    board: TaskBoard,
    ledger: IncentiveLedger,
    limiter: RateLimiter,
    operation_timeout: Duration,
}

impl<S: BoardStore> BoardCoordinator<S> {
    /// Assemble a coordinator. Every store call is bounded by `operation_timeout`.
    pub fn new(
        store: Arc<S>,
        board: TaskBoard,
        ledger: IncentiveLedger,
        limiter: RateLimiter,
        operation_timeout: Duration,
    ) -> Self {
        Self { store, board, ledger, limiter, operation_timeout }
    }

    /// Wire the board and ledger from configuration.
    pub fn from_config(store: Arc<S>, limiter: RateLimiter, config: &Config) -> Self {
        Self::new(
            store,
            TaskBoard::new(HotScoreCalculator::new(&config.hot_score)),
            IncentiveLedger::new(&config.ledger),
            limiter,
            Duration::from_millis(config.database.operation_timeout_ms),
        )
    }

    /// Apply the rate limit for `identity` on `operation` with the
    /// configured default quota.
    pub async fn admit(&self, identity: &str, operation: Operation) -> DomainResult<()> {
        let limit = self.limiter.default_limit();
        match self.limiter.check_and_increment(identity, operation.as_str(), limit).await {
            RateDecision::Allowed => Ok(()),
            RateDecision::Denied { retry_after } => Err(DomainError::RateLimited {
                operation: operation.as_str().to_string(),
                retry_after_secs: retry_after.as_secs(),
            }),
        }
    }

    /// Register an agent, or refresh the profile of an existing codename.
    pub async fn register_agent(&self, registration: AgentRegistration) -> DomainResult<AgentUpsert> {
        registration.validate().map_err(DomainError::Validation)?;
        let candidate = Agent::register(registration, self.ledger.initial_levels(), Utc::now());

        let upsert = self.bounded(Operation::RegisterAgent, self.store.upsert_agent(&candidate)).await?;
        tracing::info!(
            agent_id = %upsert.agent.id,
            codename = %upsert.agent.codename,
            created = upsert.created,
            "agent registered"
        );
        Ok(upsert)
    }

    /// All agents, newest first.
    pub async fn list_agents(&self) -> DomainResult<Vec<Agent>> {
        self.bounded(Operation::ListAgents, self.store.list_agents()).await
    }

    /// Look up one agent.
    pub async fn get_agent(&self, agent_id: Uuid) -> DomainResult<Agent> {
        self.bounded(Operation::GetAgent, self.store.get_agent(agent_id))
            .await?
            .ok_or(DomainError::AgentNotFound(agent_id))
    }

    /// Look up one task, with its hot score as of now.
    pub async fn get_task(&self, task_id: Uuid) -> DomainResult<Task> {
        let task = self
            .bounded(Operation::GetTask, self.store.get_task(task_id))
            .await?
            .ok_or(DomainError::TaskNotFound(task_id))?;
        Ok(self.board.rescore(task, Utc::now()))
    }

    /// Validate and post a new open task.
    pub async fn create_task(&self, new_task: NewTask) -> DomainResult<Task> {
        let task = self.board.prepare(new_task, Utc::now())?;
        self.bounded(Operation::CreateTask, self.store.insert_task(&task)).await?;
        tracing::info!(task_id = %task.id, hot_score = task.hot_score, "task created");
        Ok(task)
    }

    /// Open tasks ranked by hot score, at most `limit` of them.
    ///
    /// Limits above [`MAX_HOT_LIMIT`] are clamped; zero is rejected.
    pub async fn list_hot(&self, limit: usize) -> DomainResult<HotTasks> {
        if limit == 0 {
            return Err(DomainError::Validation("limit must be at least 1".to_string()));
        }
        let limit = limit.min(MAX_HOT_LIMIT);
        let open = self.bounded(Operation::ListHot, self.store.list_open_tasks()).await?;
        Ok(self.board.rank(open, limit, Utc::now()))
    }

    /// Claim an open task and pay the anticipation bonus, atomically.
    pub async fn claim_task(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<ClaimReceipt> {
        let receipt = self.bounded(Operation::ClaimTask, self.claim_in_transaction(task_id, agent_id)).await?;
        tracing::info!(
            %task_id,
            %agent_id,
            dopamine = receipt.reward.level,
            "task claimed"
        );
        Ok(receipt)
    }

    /// Complete a claimed task and pay its reward, atomically.
    pub async fn complete_task(
        &self,
        task_id: Uuid,
        agent_id: Uuid,
        output: serde_json::Value,
    ) -> DomainResult<CompletionReceipt> {
        let receipt = self
            .bounded(Operation::CompleteTask, self.complete_in_transaction(task_id, agent_id, output))
            .await?;
        tracing::info!(
            %task_id,
            %agent_id,
            dopamine = receipt.reward.level,
            tasks_completed = receipt.agent.tasks_completed,
            fully_resolved = receipt.task.is_fully_resolved(),
            "task completed"
        );
        Ok(receipt)
    }

    async fn claim_in_transaction(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<ClaimReceipt> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let task = match self.board.claim(tx.as_mut(), task_id, agent_id, now).await {
            Ok(task) => task,
            Err(err @ (DomainError::Conflict { .. } | DomainError::TaskNotFound(_))) => {
                if tx.get_agent(agent_id).await?.is_none() {
                    return Err(DomainError::AgentNotFound(agent_id));
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let mut agent = tx.get_agent(agent_id).await?.ok_or(DomainError::AgentNotFound(agent_id))?;
        let reward = self.ledger.claim_anticipation(&mut agent);
        write_ledger(tx.as_mut(), &agent, reward.expected_version).await?;
        tx.commit().await?;

        Ok(ClaimReceipt { task, agent, reward })
    }

    async fn complete_in_transaction(
        &self,
        task_id: Uuid,
        agent_id: Uuid,
        output: serde_json::Value,
    ) -> DomainResult<CompletionReceipt> {
        let now = Utc::now();
        let mut tx = self.store.begin().await?;

        let task = self.board.complete(tx.as_mut(), task_id, agent_id, output, now).await?;

        let mut agent = tx.get_agent(agent_id).await?.ok_or(DomainError::AgentNotFound(agent_id))?;
        let reward = self.ledger.completion_reward(&mut agent, &task);
        write_ledger(tx.as_mut(), &agent, reward.expected_version).await?;
        tx.commit().await?;

        let total_boost = reward.amount + self.ledger.claim_bonus();
        Ok(CompletionReceipt { task, agent, reward, total_boost })
    }

    /// Bound a store call by the operation timeout. A timeout means the
    /// outcome is unknown.
    async fn bounded<T>(&self, operation: Operation, call: impl Future<Output = DomainResult<T>>) -> DomainResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.operation_timeout.as_millis();
                tracing::error!(%operation, timeout_ms, "operation timed out, outcome unknown");
                Err(DomainError::Unavailable(format!(
                    "{operation} timed out after {timeout_ms}ms; outcome unknown"
                )))
            }
        }
    }
}

async fn write_ledger(tx: &mut dyn BoardTransaction, agent: &Agent, expected_version: u64) -> DomainResult<()> {
    if tx.update_agent_ledger(agent, expected_version).await? {
        Ok(())
    } else {
        Err(DomainError::DatabaseError(format!(
            "ledger of agent {} changed during the transaction",
            agent.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCounterStore;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteBoardStore};
    use crate::domain::models::{CounterStoreConfig, RateLimitConfig, TaskStatus};
    use serde_json::json;

    async fn coordinator_with(rate_limit: RateLimitConfig) -> BoardCoordinator<SqliteBoardStore> {
        let store = Arc::new(SqliteBoardStore::new(create_migrated_test_pool().await.unwrap()));
        let limiter = RateLimiter::new(
            Arc::new(InMemoryCounterStore::new()),
            &rate_limit,
            &CounterStoreConfig::default(),
        );
        BoardCoordinator::from_config(store, limiter, &Config::default())
    }

    async fn coordinator() -> BoardCoordinator<SqliteBoardStore> {
        coordinator_with(RateLimitConfig::default()).await
    }

    async fn register(coordinator: &BoardCoordinator<SqliteBoardStore>, codename: &str) -> Agent {
        coordinator
            .register_agent(AgentRegistration::new(codename, "alpha_delta", "data_miner"))
            .await
            .unwrap()
            .agent
    }

    #[tokio::test]
    async fn test_claim_pays_bonus_once() {
        let coordinator = coordinator().await;
        let a = register(&coordinator, "Alpha-1").await;
        let b = register(&coordinator, "Alpha-2").await;
        let task = coordinator.create_task(NewTask::new("T", "D", "C")).await.unwrap();

        let receipt = coordinator.claim_task(task.id, a.id).await.unwrap();
        assert_eq!(receipt.dopamine_boost(), 0.2);
        assert!((receipt.agent.dopamine() - 1.2).abs() < 1e-9);

        let lost = coordinator.claim_task(task.id, b.id).await.unwrap_err();
        assert!(matches!(lost, DomainError::Conflict { .. }));

        let b_after = coordinator.get_agent(b.id).await.unwrap();
        assert_eq!(b_after.dopamine(), 1.0);
        assert_eq!(b_after.tasks_claimed, 0);
    }

    #[tokio::test]
    async fn test_claim_unknown_agent_or_task() {
        let coordinator = coordinator().await;
        let a = register(&coordinator, "Alpha-1").await;
        let task = coordinator.create_task(NewTask::new("T", "D", "C")).await.unwrap();

        let err = coordinator.claim_task(task.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::AgentNotFound(_)));
        assert_eq!(coordinator.get_task(task.id).await.unwrap().status, TaskStatus::Open);

        let err = coordinator.claim_task(Uuid::new_v4(), a.id).await.unwrap_err();
        assert!(matches!(err, DomainError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_complete_by_other_agent_changes_nothing() {
        let coordinator = coordinator().await;
        let a = register(&coordinator, "Alpha-1").await;
        let b = register(&coordinator, "Alpha-2").await;
        let task = coordinator.create_task(NewTask::new("T", "D", "C")).await.unwrap();
        coordinator.claim_task(task.id, a.id).await.unwrap();

        let err = coordinator.complete_task(task.id, b.id, json!({})).await.unwrap_err();
        assert!(matches!(err, DomainError::NotAssigned { .. }));

        let stored = coordinator.get_task(task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Claimed);
        assert_eq!(coordinator.get_agent(b.id).await.unwrap().tasks_completed, 0);
    }

    #[tokio::test]
    async fn test_complete_pays_reward() {
        let coordinator = coordinator().await;
        let a = register(&coordinator, "Alpha-1").await;
        let task = coordinator.create_task(NewTask::new("T", "D", "C").with_reward(2.5)).await.unwrap();
        coordinator.claim_task(task.id, a.id).await.unwrap();

        let receipt = coordinator.complete_task(task.id, a.id, json!({"rows": 3})).await.unwrap();

        assert_eq!(receipt.reward.amount, 2.5);
        assert!((receipt.total_boost - 2.7).abs() < 1e-9);
        assert!((receipt.agent.dopamine() - 3.7).abs() < 1e-9);
        assert_eq!(receipt.agent.tasks_completed, 1);
        assert_eq!(receipt.task.status, TaskStatus::Complete);
        assert_eq!(receipt.task.perspectives_collected, 1);

        let again = coordinator.complete_task(task.id, a.id, json!({})).await.unwrap_err();
        assert!(matches!(again, DomainError::InvalidState { status: TaskStatus::Complete, .. }));
    }

    #[tokio::test]
    async fn test_complete_open_task_is_invalid_state() {
        let coordinator = coordinator().await;
        let a = register(&coordinator, "Alpha-1").await;
        let task = coordinator.create_task(NewTask::new("T", "D", "C")).await.unwrap();

        let err = coordinator.complete_task(task.id, a.id, json!({})).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { status: TaskStatus::Open, .. }));
    }

    #[tokio::test]
    async fn test_list_hot_rejects_zero_limit() {
        let coordinator = coordinator().await;
        assert!(matches!(coordinator.list_hot(0).await, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_hot_clamps_large_limit() {
        let coordinator = coordinator().await;
        for i in 0..(MAX_HOT_LIMIT + 5) {
            coordinator
                .create_task(NewTask::new(format!("T{i}"), "D", "C"))
                .await
                .unwrap();
        }

        let hot = coordinator.list_hot(MAX_HOT_LIMIT + 1).await.unwrap();
        assert_eq!(hot.len(), MAX_HOT_LIMIT);
    }

    #[tokio::test]
    async fn test_get_task_and_list_hot_agree_on_aged_score() {
        let coordinator = coordinator().await;
        let created = Utc::now() - chrono::Duration::hours(5);
        let task = coordinator
            .board
            .prepare(NewTask::new("Stale", "D", "C").with_priority(5).with_reward(0.0), created)
            .unwrap();
        coordinator.store.insert_task(&task).await.unwrap();
        assert_eq!(task.hot_score, 5.0);

        let fetched = coordinator.get_task(task.id).await.unwrap();
        let hot = coordinator.list_hot(10).await.unwrap().into_vec();

        assert!(fetched.hot_score > 6.9, "aged score should include the age bonus");
        assert!((fetched.hot_score - hot[0].hot_score).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_input() {
        let coordinator = coordinator().await;
        let err = coordinator
            .register_agent(AgentRegistration::new("", "team", "role"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn test_admit_raises_rate_limited() {
        let coordinator = coordinator_with(RateLimitConfig {
            requests_per_minute: 2,
            ..RateLimitConfig::default()
        })
        .await;

        coordinator.admit("client", Operation::ClaimTask).await.unwrap();
        coordinator.admit("client", Operation::ClaimTask).await.unwrap();
        let err = coordinator.admit("client", Operation::ClaimTask).await.unwrap_err();

        match err {
            DomainError::RateLimited { operation, retry_after_secs } => {
                assert_eq!(operation, "claim_task");
                assert!(retry_after_secs > 0 && retry_after_secs <= 60);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        coordinator.admit("client", Operation::CompleteTask).await.unwrap();
    }
}
