//! Clock port - source of "now" for validity-window checks.

use crate::domain::foundation::Timestamp;

/// Supplies the current time.
///
/// Injected everywhere a rule depends on time so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
