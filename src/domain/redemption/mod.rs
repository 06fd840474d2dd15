//! Redemption module - the error taxonomy shared by every handler.

mod errors;

pub use errors::RedemptionError;
