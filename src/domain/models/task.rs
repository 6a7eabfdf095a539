//! Task domain model.
//!
//! Tasks are units of work posted on the board. A task is claimed by
//! exactly one agent and completed only by that agent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a task. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Posted and waiting for an agent
    Open,
    /// Held by exactly one agent
    Claimed,
    /// Finished by the claiming agent
    Complete,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl TaskStatus {
    /// Name stored in the database and returned over HTTP.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
            Self::Complete => "complete",
        }
    }

    /// Parse a stored status name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "claimed" => Some(Self::Claimed),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Open => &[Self::Claimed],
            Self::Claimed => &[Self::Complete],
            Self::Complete => &[],
        }
    }

    /// Whether moving to `new_status` goes forward one step.
    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields for a new task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    /// Short title, required.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category label, required.
    pub category: String,
    /// Defaults to 5.
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Reward paid on completion. Defaults to 1.0; must be finite and non-negative.
    #[serde(default = "default_dopamine_reward")]
    pub dopamine_reward: f64,
    /// Defaults to 3.
    #[serde(default = "default_perspectives_required")]
    pub perspectives_required: u32,
}

const fn default_priority() -> i32 {
    5
}

const fn default_dopamine_reward() -> f64 {
    1.0
}

const fn default_perspectives_required() -> u32 {
    3
}

impl NewTask {
    /// New task with the optional fields at their defaults.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            priority: default_priority(),
            dopamine_reward: default_dopamine_reward(),
            perspectives_required: default_perspectives_required(),
        }
    }

    /// Override the default priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Override the default reward.
    pub fn with_reward(mut self, dopamine_reward: f64) -> Self {
        self.dopamine_reward = dopamine_reward;
        self
    }

    /// Override the perspectives requested.
    pub fn with_perspectives(mut self, perspectives_required: u32) -> Self {
        self.perspectives_required = perspectives_required;
        self
    }

    /// Check input ranges before any state is touched.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("category cannot be empty".to_string());
        }
        if self.priority <= 0 {
            return Err(format!("priority must be positive, got {}", self.priority));
        }
        if !self.dopamine_reward.is_finite() || self.dopamine_reward < 0.0 {
            return Err(format!(
                "dopamine_reward must be a non-negative number, got {}",
                self.dopamine_reward
            ));
        }
        if self.perspectives_required == 0 {
            return Err("perspectives_required must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Task id.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// Caller-assigned priority.
    pub priority: i32,
    /// Reward paid on completion.
    pub dopamine_reward: f64,
    /// Perspectives the task asks for.
    pub perspectives_required: u32,
    /// Perspectives gathered so far.
    pub perspectives_collected: u32,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Set on claim and kept after completion as provenance.
    pub assigned_to: Option<Uuid>,
    /// Set when the claim won.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set on completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Completion output.
    pub output: Option<serde_json::Value>,
    /// Ranking score, recomputed on every read.
    pub hot_score: f64,
    /// Creation time; drives the age bonus.
    pub created_at: DateTime<Utc>,
    /// Last transition time.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Build an open task from validated input. The hot score is filled in
    /// by the board.
    pub fn open(new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            category: new.category,
            priority: new.priority,
            dopamine_reward: new.dopamine_reward,
            perspectives_required: new.perspectives_required,
            perspectives_collected: 0,
            status: TaskStatus::Open,
            assigned_to: None,
            claimed_at: None,
            completed_at: None,
            output: None,
            hot_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether every required perspective has been collected.
    pub fn is_fully_resolved(&self) -> bool {
        self.perspectives_collected >= self.perspectives_required
    }

    /// Check the assignment invariant: `assigned_to` is set exactly when the
    /// task has left `open`.
    pub fn assignment_consistent(&self) -> bool {
        match self.status {
            TaskStatus::Open => self.assigned_to.is_none(),
            TaskStatus::Claimed | TaskStatus::Complete => self.assigned_to.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(TaskStatus::Open.can_transition_to(TaskStatus::Claimed));
        assert!(TaskStatus::Claimed.can_transition_to(TaskStatus::Complete));

        assert!(!TaskStatus::Open.can_transition_to(TaskStatus::Complete));
        assert!(!TaskStatus::Claimed.can_transition_to(TaskStatus::Open));
        assert!(!TaskStatus::Complete.can_transition_to(TaskStatus::Open));
        assert!(!TaskStatus::Complete.can_transition_to(TaskStatus::Claimed));
        assert!(TaskStatus::Complete.valid_transitions().is_empty());
    }

    #[test]
    fn test_status_round_trip_strings() {
        for status in [TaskStatus::Open, TaskStatus::Claimed, TaskStatus::Complete] {
            assert_eq!(TaskStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::from_str("completed"), None);
        assert_eq!(TaskStatus::from_str("Open"), None);
        assert_eq!(TaskStatus::from_str("running"), None);
    }

    #[test]
    fn test_new_task_defaults() {
        let new = NewTask::new("Extract", "raw text", "data_mining");
        assert_eq!(new.priority, 5);
        assert!((new.dopamine_reward - 1.0).abs() < f64::EPSILON);
        assert_eq!(new.perspectives_required, 3);
        assert!(new.validate().is_ok());
    }

    #[test]
    fn test_new_task_validation() {
        let base = NewTask::new("Extract", "raw text", "data_mining");

        assert!(base.clone().with_priority(0).validate().is_err());
        assert!(base.clone().with_priority(-3).validate().is_err());
        assert!(base.clone().with_reward(-0.1).validate().is_err());
        assert!(base.clone().with_reward(f64::NAN).validate().is_err());
        assert!(base.clone().with_perspectives(0).validate().is_err());
        assert!(base.clone().with_reward(0.0).validate().is_ok());

        let mut untitled = base;
        untitled.title = "   ".to_string();
        assert!(untitled.validate().is_err());
    }

    #[test]
    fn test_open_task_is_unassigned() {
        let task = Task::open(NewTask::new("T", "D", "C"), Utc::now());
        assert_eq!(task.status, TaskStatus::Open);
        assert!(task.assigned_to.is_none());
        assert!(task.assignment_consistent());
        assert!(!task.is_fully_resolved());
    }

    #[test]
    fn test_new_task_deserializes_with_defaults() {
        let new: NewTask = serde_json::from_str(
            r#"{"title":"T","description":"D","category":"C"}"#,
        )
        .unwrap();
        assert_eq!(new.priority, 5);
        assert_eq!(new.perspectives_required, 3);
    }
}
