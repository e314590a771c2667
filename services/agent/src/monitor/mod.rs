//! Monitor tasks.
//!
//! One [`AccountMonitor`] per configured account, one
//! [`ReservationMonitor`] per directly-configured reservation or
//! account-discovered flight. Account monitors own their flight monitors
//! and reconcile them against each poll of the reservation listing.

use std::time::Duration;

pub mod account;
pub mod reservation;

pub use account::{AccountMonitor, PollResult};
pub use reservation::ReservationMonitor;

/// Bounded retry policy for transient airline errors.
///
/// `max_attempts` counts the initial try, so the default allows three
/// retries after the first failure. The backoff is fixed; the airline's
/// rate limiter reacts to bursts, not to sustained pacing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Policy with no backoff, for tests that only count attempts.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::ZERO,
        }
    }
}
