//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod promotion;
pub mod referral;

pub use promotion::*;
pub use referral::*;
