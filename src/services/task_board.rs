//! Task lifecycle state machine and hot-task ranking.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{NewTask, Task, TaskStatus};
use crate::domain::ports::{BoardTransaction, TaskTransition};
use crate::services::hot_score::HotScoreCalculator;

/// Largest page `list_hot` will return.
pub const MAX_HOT_LIMIT: usize = 100;

/// Open tasks in ranking order, capped at a limit.
///
/// Iterating is cheap and can be repeated; every pass yields the same tasks
/// in the same order.
#[derive(Debug, Clone, Default)]
pub struct HotTasks {
    ranked: Vec<Task>,
    limit: usize,
}

impl HotTasks {
    /// Tasks in ranking order, at most `limit` of them.
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.ranked.iter().take(self.limit)
    }

    /// Number of tasks the iterator yields.
    pub fn len(&self) -> usize {
        self.ranked.len().min(self.limit)
    }

    /// True when no open task made the list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume into the capped, ranked tasks.
    pub fn into_vec(mut self) -> Vec<Task> {
        self.ranked.truncate(self.limit);
        self.ranked
    }
}

impl<'a> IntoIterator for &'a HotTasks {
    type Item = &'a Task;
    type IntoIter = std::iter::Take<std::slice::Iter<'a, Task>>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranked.iter().take(self.limit)
    }
}

/// Ranking order: hot score descending, then priority descending, then
/// oldest first, then id.
fn hot_order(a: &Task, b: &Task) -> Ordering {
    b.hot_score
        .total_cmp(&a.hot_score)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Task state machine and ranking.
///
/// Hot scores are derived from priority, reward and age, so every task handed
/// back to a caller is rescored as of the read.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    scorer: HotScoreCalculator,
}

impl TaskBoard {
    /// Board ranking with `scorer`.
    pub fn new(scorer: HotScoreCalculator) -> Self {
        Self { scorer }
    }

    /// Replace the stored hot score with its value at `now`.
    pub fn rescore(&self, mut task: Task, now: DateTime<Utc>) -> Task {
        task.hot_score = self.scorer.score(&task, now);
        task
    }

    /// Validate input and build the open task to insert.
    pub fn prepare(&self, new_task: NewTask, now: DateTime<Utc>) -> DomainResult<Task> {
        new_task.validate().map_err(DomainError::Validation)?;
        let mut task = Task::open(new_task, now);
        task.hot_score = self.scorer.score(&task, now);
        Ok(task)
    }

    /// Rescore open tasks as of `now` and rank them.
    pub fn rank(&self, tasks: Vec<Task>, limit: usize, now: DateTime<Utc>) -> HotTasks {
        let mut ranked: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Open)
            .map(|t| self.rescore(t, now))
            .collect();
        ranked.sort_by(hot_order);
        HotTasks { ranked, limit }
    }

    /// Claim an open task for `agent_id`.
    ///
    /// The conditional write is issued before anything is read. When it does
    /// not apply, nothing has been written and the error says why.
    pub async fn claim(
        &self,
        tx: &mut dyn BoardTransaction,
        task_id: Uuid,
        agent_id: Uuid,
        now: DateTime<Utc>,
    ) -> DomainResult<Task> {
        let transition = TaskTransition::Claim { task_id, agent_id, at: now };
        if let Some(task) = tx.transition_task(&transition).await? {
            debug_assert!(task.assignment_consistent());
            return Ok(self.rescore(task, now));
        }

        match tx.get_task(task_id).await? {
            None => Err(DomainError::TaskNotFound(task_id)),
            Some(_) => {
                tracing::debug!(%task_id, %agent_id, "claim lost to another agent");
                Err(DomainError::Conflict { task_id })
            }
        }
    }

    /// Complete a task claimed by `agent_id`, storing `output`.
    pub async fn complete(
        &self,
        tx: &mut dyn BoardTransaction,
        task_id: Uuid,
        agent_id: Uuid,
        output: serde_json::Value,
        now: DateTime<Utc>,
    ) -> DomainResult<Task> {
        let transition = TaskTransition::Complete { task_id, agent_id, output, at: now };
        if let Some(task) = tx.transition_task(&transition).await? {
            debug_assert!(task.assignment_consistent());
            return Ok(self.rescore(task, now));
        }

        let task = tx.get_task(task_id).await?.ok_or(DomainError::TaskNotFound(task_id))?;
        match task.status {
            TaskStatus::Claimed if task.assigned_to != Some(agent_id) => {
                Err(DomainError::NotAssigned { task_id, agent_id })
            }
            status => Err(DomainError::InvalidState { task_id, status }),
        }
    }
}
