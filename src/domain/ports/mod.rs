//! Port trait definitions (Hexagonal Architecture)
//!
//! - `BoardStore`: transactional storage for agents and tasks
//! - `CounterStore`: ephemeral expiring counters for rate limiting

pub mod board_store;
pub mod counter_store;

pub use board_store::{AgentUpsert, BoardStore, BoardTransaction, TaskTransition};
pub use counter_store::{CounterStore, CounterStoreError, CounterWindow};
