//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;
mod reward_sweeper;
mod store_policy;

pub use reward_sweeper::{RewardSweeper, RewardSweeperConfig};
pub use store_policy::StorePolicy;
