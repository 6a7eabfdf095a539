//! SQLite implementation of the BoardStore.
//!
//! Claim and completion are single `UPDATE ... WHERE status = ?` statements,
//! so the status check and the write are indivisible. The conditional write
//! is always the first statement of a board transaction, which takes the
//! database write lock before anything is read.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use super::{format_timestamp, parse_datetime, parse_json_or_default, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Agent, FibonacciLevel, HormoneLevels, Task, TaskStatus};
use crate::domain::ports::{AgentUpsert, BoardStore, BoardTransaction, TaskTransition};

/// Board store over a SQLite pool.
#[derive(Clone)]
pub struct SqliteBoardStore {
    pool: SqlitePool,
}

impl SqliteBoardStore {
    /// Store over a pool whose schema is already migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoardStore for SqliteBoardStore {
    async fn begin(&self) -> DomainResult<Box<dyn BoardTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteBoardTransaction { tx }))
    }

    async fn upsert_agent(&self, candidate: &Agent) -> DomainResult<AgentUpsert> {
        let specialization_json = serde_json::to_string(&candidate.specialization)?;
        let models_json = serde_json::to_string(&candidate.models_access)?;
        let hormones_json = serde_json::to_string(&candidate.hormone_levels)?;

        let row: AgentRow = sqlx::query_as(
            r#"INSERT INTO agents (id, codename, team, role, specialization, models_access,
               hormone_levels, tasks_claimed, tasks_completed, success_rate, fibonacci_level,
               ledger_version, created_at, last_heartbeat)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(codename) DO UPDATE SET
                   team = excluded.team,
                   role = excluded.role,
                   specialization = excluded.specialization,
                   models_access = excluded.models_access,
                   last_heartbeat = excluded.last_heartbeat
               RETURNING *"#
        )
        .bind(candidate.id.to_string())
        .bind(&candidate.codename)
        .bind(&candidate.team)
        .bind(&candidate.role)
        .bind(&specialization_json)
        .bind(&models_json)
        .bind(&hormones_json)
        .bind(candidate.tasks_claimed as i64)
        .bind(candidate.tasks_completed as i64)
        .bind(candidate.success_rate)
        .bind(i64::from(candidate.fibonacci_level.value()))
        .bind(candidate.ledger_version as i64)
        .bind(format_timestamp(&candidate.created_at))
        .bind(format_timestamp(&candidate.last_heartbeat))
        .fetch_one(&self.pool)
        .await?;

        let agent: Agent = row.try_into()?;
        let created = agent.id == candidate.id;
        Ok(AgentUpsert { agent, created })
    }

    async fn get_agent(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_agents(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents ORDER BY created_at DESC, id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn insert_task(&self, task: &Task) -> DomainResult<()> {
        let output_json = task.output.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO tasks (id, title, description, category, priority, dopamine_reward,
               perspectives_required, perspectives_collected, status, assigned_to, claimed_at,
               completed_at, output, hot_score, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#
        )
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.category)
        .bind(i64::from(task.priority))
        .bind(task.dopamine_reward)
        .bind(i64::from(task.perspectives_required))
        .bind(i64::from(task.perspectives_collected))
        .bind(task.status.as_str())
        .bind(task.assigned_to.map(|id| id.to_string()))
        .bind(task.claimed_at.as_ref().map(format_timestamp))
        .bind(task.completed_at.as_ref().map(format_timestamp))
        .bind(output_json)
        .bind(task.hot_score)
        .bind(format_timestamp(&task.created_at))
        .bind(format_timestamp(&task.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_open_tasks(&self) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE status = 'open' ORDER BY created_at, id"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// A pooled transaction. Dropping it without commit rolls back and returns
/// the connection to the pool.
pub struct SqliteBoardTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl BoardTransaction for SqliteBoardTransaction {
    async fn transition_task(&mut self, transition: &TaskTransition) -> DomainResult<Option<Task>> {
        debug_assert!(transition.from().can_transition_to(transition.to()));
        let task_id = transition.task_id().to_string();
        let agent_id = transition.agent_id().to_string();

        let row: Option<TaskRow> = match transition {
            TaskTransition::Claim { at, .. } => {
                sqlx::query_as(
                    r#"UPDATE tasks SET status = ?, assigned_to = ?, claimed_at = ?, updated_at = ?
                       WHERE id = ? AND status = ?
                       RETURNING *"#
                )
                .bind(transition.to().as_str())
                .bind(&agent_id)
                .bind(format_timestamp(at))
                .bind(format_timestamp(at))
                .bind(&task_id)
                .bind(transition.from().as_str())
                .fetch_optional(&mut *self.tx)
                .await?
            }
            TaskTransition::Complete { output, at, .. } => {
                let output_json = serde_json::to_string(output)?;
                sqlx::query_as(
                    r#"UPDATE tasks SET status = ?, completed_at = ?, output = ?, updated_at = ?,
                           perspectives_collected = MIN(perspectives_collected + 1, perspectives_required)
                       WHERE id = ? AND status = ? AND assigned_to = ?
                       RETURNING *"#
                )
                .bind(transition.to().as_str())
                .bind(format_timestamp(at))
                .bind(output_json)
                .bind(format_timestamp(at))
                .bind(&task_id)
                .bind(transition.from().as_str())
                .bind(&agent_id)
                .fetch_optional(&mut *self.tx)
                .await?
            }
        };

        row.map(TryInto::try_into).transpose()
    }

    async fn get_task(&mut self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_agent(&mut self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update_agent_ledger(&mut self, agent: &Agent, expected_version: u64) -> DomainResult<bool> {
        let hormones_json = serde_json::to_string(&agent.hormone_levels)?;

        let result = sqlx::query(
            r#"UPDATE agents SET hormone_levels = ?, tasks_claimed = ?, tasks_completed = ?,
               success_rate = ?, fibonacci_level = ?, ledger_version = ?
               WHERE id = ? AND ledger_version = ?"#
        )
        .bind(&hormones_json)
        .bind(agent.tasks_claimed as i64)
        .bind(agent.tasks_completed as i64)
        .bind(agent.success_rate)
        .bind(i64::from(agent.fibonacci_level.value()))
        .bind(agent.ledger_version as i64)
        .bind(agent.id.to_string())
        .bind(expected_version as i64)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    codename: String,
    team: String,
    role: String,
    specialization: Option<String>,
    models_access: Option<String>,
    hormone_levels: Option<String>,
    tasks_claimed: i64,
    tasks_completed: i64,
    success_rate: f64,
    fibonacci_level: i64,
    ledger_version: i64,
    created_at: String,
    last_heartbeat: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let hormone_levels: HormoneLevels = parse_json_or_default(row.hormone_levels)?;
        let fibonacci_level = u8::try_from(row.fibonacci_level)
            .map_err(|e| DomainError::SerializationError(e.to_string()))
            .and_then(|v| FibonacciLevel::try_from(v).map_err(DomainError::SerializationError))?;

        Ok(Agent {
            id: parse_uuid(&row.id)?,
            codename: row.codename,
            team: row.team,
            role: row.role,
            specialization: parse_json_or_default(row.specialization)?,
            models_access: parse_json_or_default(row.models_access)?,
            hormone_levels,
            tasks_claimed: row.tasks_claimed as u64,
            tasks_completed: row.tasks_completed as u64,
            success_rate: row.success_rate,
            fibonacci_level,
            ledger_version: row.ledger_version as u64,
            created_at: parse_datetime(&row.created_at)?,
            last_heartbeat: parse_datetime(&row.last_heartbeat)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    description: String,
    category: String,
    priority: i64,
    dopamine_reward: f64,
    perspectives_required: i64,
    perspectives_collected: i64,
    status: String,
    assigned_to: Option<String>,
    claimed_at: Option<String>,
    completed_at: Option<String>,
    output: Option<String>,
    hot_score: f64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let status = TaskStatus::from_str(&row.status)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid status: {}", row.status)))?;

        let output = row.output
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            title: row.title,
            description: row.description,
            category: row.category,
            priority: row.priority as i32,
            dopamine_reward: row.dopamine_reward,
            perspectives_required: row.perspectives_required as u32,
            perspectives_collected: row.perspectives_collected as u32,
            status,
            assigned_to: parse_optional_uuid(row.assigned_to)?,
            claimed_at: parse_optional_datetime(row.claimed_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            output,
            hot_score: row.hot_score,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
