//! Adapters - Implementations of port interfaces.
//!
//! - `clock` - System and fixed clocks
//! - `memory` - In-memory stores and reward ledger
//! - `postgres` - PostgreSQL stores and reward ledger

mod clock;
pub mod memory;
pub mod postgres;

pub use clock::{FixedClock, SystemClock};
pub use memory::{InMemoryPromoCodeStore, InMemoryReferralStore, InMemoryRewardLedger};
pub use postgres::{PostgresPromoCodeStore, PostgresReferralStore, PostgresRewardLedger};
