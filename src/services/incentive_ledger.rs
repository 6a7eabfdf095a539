//! Hormone-level arithmetic and reward issuance.
//!
//! The ledger only mutates an in-memory [`Agent`]; persisting the result is
//! the caller's job, inside the same transaction as the task transition.

use serde::Serialize;

use crate::domain::models::{Agent, FibonacciLevel, HormoneLevels, LedgerConfig, Task, DOPAMINE};

/// Which reward rule was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardEvent {
    /// Fixed bonus paid when a claim wins
    ClaimAnticipation,
    /// Task reward paid when the claimant completes
    CompletionReward,
}

/// Outcome of one reward application.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardDelta {
    /// Rule that produced this delta.
    pub event: RewardEvent,
    /// Hormone that was credited.
    pub hormone: &'static str,
    /// Amount credited.
    pub amount: f64,
    /// Level after the reward was applied.
    pub level: f64,
    /// Ledger version the stored agent must still carry for the write to apply.
    pub expected_version: u64,
}

/// Reward rules applied to an agent's hormone levels and work counters.
#[derive(Debug, Clone)]
pub struct IncentiveLedger {
    claim_bonus: f64,
    initial_levels: HormoneLevels,
}

impl Default for IncentiveLedger {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

impl IncentiveLedger {
    /// Build the ledger from its configuration section.
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            claim_bonus: config.claim_bonus,
            initial_levels: HormoneLevels::initial(
                config.initial_dopamine,
                config.initial_oxytocin,
                config.initial_adrenaline,
            ),
        }
    }

    /// Dopamine credited on every winning claim.
    pub fn claim_bonus(&self) -> f64 {
        self.claim_bonus
    }

    /// Levels a newly registered agent starts with.
    pub fn initial_levels(&self) -> HormoneLevels {
        self.initial_levels.clone()
    }

    /// Credit the fixed anticipation bonus for a successful claim.
    ///
    /// The success rate is left alone; it only moves on completion.
    pub fn claim_anticipation(&self, agent: &mut Agent) -> RewardDelta {
        let expected_version = agent.ledger_version;
        let level = agent.hormone_levels.credit(DOPAMINE, self.claim_bonus);

        agent.tasks_claimed += 1;
        agent.ledger_version += 1;

        RewardDelta {
            event: RewardEvent::ClaimAnticipation,
            hormone: DOPAMINE,
            amount: self.claim_bonus,
            level,
            expected_version,
        }
    }

    /// Credit the task's reward for a successful completion.
    pub fn completion_reward(&self, agent: &mut Agent, task: &Task) -> RewardDelta {
        let expected_version = agent.ledger_version;
        let level = agent.hormone_levels.credit(DOPAMINE, task.dopamine_reward);

        agent.tasks_completed += 1;
        agent.success_rate = success_rate(agent.tasks_completed, agent.tasks_claimed);
        agent.fibonacci_level = agent
            .fibonacci_level
            .max(FibonacciLevel::for_completions(agent.tasks_completed));
        agent.ledger_version += 1;

        RewardDelta {
            event: RewardEvent::CompletionReward,
            hormone: DOPAMINE,
            amount: task.dopamine_reward,
            level,
            expected_version,
        }
    }
}

/// Completed over claimed, or 0 before the first claim.
pub fn success_rate(tasks_completed: u64, tasks_claimed: u64) -> f64 {
    if tasks_claimed == 0 {
        0.0
    } else {
        (tasks_completed as f64 / tasks_claimed as f64).min(1.0)
    }
}
