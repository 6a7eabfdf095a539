//! Agent domain model.
//!
//! Agents are registered workers that compete for tasks on the board.
//! Their hormone levels form an incentive ledger that only reward events
//! may change.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hormone credited by claims and completions.
pub const DOPAMINE: &str = "dopamine";
/// Tracked but not changed by this board.
pub const OXYTOCIN: &str = "oxytocin";
/// Tracked but not changed by this board.
pub const ADRENALINE: &str = "adrenaline";

/// Open mapping from hormone name to level.
///
/// Recognized names are dopamine, oxytocin and adrenaline. Unknown keys are
/// kept as-is so they round-trip through storage untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HormoneLevels(BTreeMap<String, f64>);

impl HormoneLevels {
    /// Starting levels for a newly registered agent.
    pub fn initial(dopamine: f64, oxytocin: f64, adrenaline: f64) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(DOPAMINE.to_string(), dopamine);
        levels.insert(OXYTOCIN.to_string(), oxytocin);
        levels.insert(ADRENALINE.to_string(), adrenaline);
        Self(levels)
    }

    /// Level of `hormone`, if present.
    pub fn get(&self, hormone: &str) -> Option<f64> {
        self.0.get(hormone).copied()
    }

    /// Dopamine level, 0 when absent.
    pub fn dopamine(&self) -> f64 {
        self.get(DOPAMINE).unwrap_or(0.0)
    }

    /// Add to a hormone level. Only the incentive ledger calls this.
    pub(crate) fn credit(&mut self, hormone: &str, amount: f64) -> f64 {
        let level = self.0.entry(hormone.to_string()).or_insert(0.0);
        *level = (*level + amount).max(0.0);
        *level
    }
}

/// Rank of an agent on the Fibonacci ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FibonacciLevel {
    /// Entry level
    One = 1,
    /// 5 completions
    Two = 2,
    /// 13 completions
    Three = 3,
    /// 34 completions
    Five = 5,
    /// 89 completions
    Eight = 8,
}

impl Default for FibonacciLevel {
    fn default() -> Self {
        Self::One
    }
}

impl FibonacciLevel {
    /// Numeric rank as shown to clients.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Level earned by a number of completed tasks.
    pub fn for_completions(tasks_completed: u64) -> Self {
        match tasks_completed {
            0..=4 => Self::One,
            5..=12 => Self::Two,
            13..=33 => Self::Three,
            34..=88 => Self::Five,
            _ => Self::Eight,
        }
    }
}

impl TryFrom<u8> for FibonacciLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            5 => Ok(Self::Five),
            8 => Ok(Self::Eight),
            other => Err(format!("Invalid fibonacci level: {other}")),
        }
    }
}

impl From<FibonacciLevel> for u8 {
    fn from(level: FibonacciLevel) -> Self {
        level.value()
    }
}

impl fmt::Display for FibonacciLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Registration payload. Upserted on `codename`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Unique name; registration upserts on it.
    pub codename: String,
    /// Team name.
    pub team: String,
    /// Role within the team.
    pub role: String,
    /// Specialization tags.
    #[serde(default)]
    pub specialization: BTreeSet<String>,
    /// Models the agent can use.
    #[serde(default)]
    pub models_access: BTreeSet<String>,
}

impl AgentRegistration {
    /// Registration with no tags or models.
    pub fn new(codename: impl Into<String>, team: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            codename: codename.into(),
            team: team.into(),
            role: role.into(),
            specialization: BTreeSet::new(),
            models_access: BTreeSet::new(),
        }
    }

    /// Add a specialization tag.
    pub fn with_specialization(mut self, tag: impl Into<String>) -> Self {
        self.specialization.insert(tag.into());
        self
    }

    /// Add a model the agent can use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.models_access.insert(model.into());
        self
    }

    /// Check required fields and the codename length.
    pub fn validate(&self) -> Result<(), String> {
        if self.codename.trim().is_empty() {
            return Err("codename cannot be empty".to_string());
        }
        if self.codename.len() > 64 {
            return Err("codename cannot exceed 64 characters".to_string());
        }
        if self.team.trim().is_empty() {
            return Err("team cannot be empty".to_string());
        }
        if self.role.trim().is_empty() {
            return Err("role cannot be empty".to_string());
        }
        Ok(())
    }
}

/// A registered worker and its incentive ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    /// Stable across re-registration.
    pub id: Uuid,
    /// Unique, case-sensitive
    pub codename: String,
    /// Team name.
    pub team: String,
    /// Role within the team.
    pub role: String,
    /// Specialization tags.
    pub specialization: BTreeSet<String>,
    /// Models the agent can use.
    pub models_access: BTreeSet<String>,
    /// Incentive levels, never negative.
    pub hormone_levels: HormoneLevels,
    /// Claims won.
    pub tasks_claimed: u64,
    /// Tasks completed.
    pub tasks_completed: u64,
    /// `tasks_completed / tasks_claimed` as of the last completion.
    pub success_rate: f64,
    /// Rank derived from `tasks_completed`.
    pub fibonacci_level: FibonacciLevel,
    /// Bumped on every ledger write; guards against lost updates.
    pub ledger_version: u64,
    /// First registration time.
    pub created_at: DateTime<Utc>,
    /// Last registration or ledger write.
    pub last_heartbeat: DateTime<Utc>,
}

impl Agent {
    /// Fresh agent with zeroed counters and the given starting levels.
    pub fn register(registration: AgentRegistration, hormone_levels: HormoneLevels, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            codename: registration.codename,
            team: registration.team,
            role: registration.role,
            specialization: registration.specialization,
            models_access: registration.models_access,
            hormone_levels,
            tasks_claimed: 0,
            tasks_completed: 0,
            success_rate: 0.0,
            fibonacci_level: FibonacciLevel::One,
            ledger_version: 0,
            created_at: now,
            last_heartbeat: now,
        }
    }

    /// Current dopamine level.
    pub fn dopamine(&self) -> f64 {
        self.hormone_levels.dopamine()
    }
}
