//! Board services.

pub mod coordinator;
pub mod hot_score;
pub mod incentive_ledger;
pub mod rate_limiter;
pub mod task_board;

pub use coordinator::{BoardCoordinator, ClaimReceipt, CompletionReceipt, Operation};
pub use hot_score::HotScoreCalculator;
pub use incentive_ledger::{IncentiveLedger, RewardDelta, RewardEvent};
pub use rate_limiter::{rate_limit_key, RateDecision, RateLimiter};
pub use task_board::{HotTasks, TaskBoard, MAX_HOT_LIMIT};
