//! Error taxonomy for the airline boundary and monitor outcomes.

use thiserror::Error;

/// Errors returned by the airline boundary.
///
/// Every caller decides retry behavior by matching on the variant, never by
/// parsing messages:
///
/// - `Transient` is retried within the bounded retry policy
/// - `AlreadyCheckedIn` is an idempotent no-op treated as success
/// - everything else is terminal for the operation that produced it
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Retryable failure: network error, rate limit, malformed single
    /// response, or a request timeout.
    #[error("transient error: {reason}")]
    Transient { reason: String },

    /// The reservation or flight no longer exists.
    #[error("reservation not found")]
    NotFound,

    /// The reservation is already checked in.
    #[error("already checked in")]
    AlreadyCheckedIn,

    /// Login was rejected. Credentials will not fix themselves, so this is
    /// never retried.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The airline requires check-in at the airport counter; automation
    /// cannot complete it.
    #[error("airport check-in required")]
    AirportCheckInRequired,

    /// Unexpected terminal failure. Carries maximal detail since it was not
    /// anticipated.
    #[error("fatal error: {reason}")]
    Fatal { reason: String },
}

impl ApiError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal {
            reason: reason.into(),
        }
    }

    /// True when the bounded retry policy applies.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Terminal state of one monitor, aggregated by the orchestrator for the
/// process exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// The monitor finished its work: check-in succeeded, or a run-once
    /// account poll completed.
    Completed,

    /// The monitor terminated with an unrecovered error.
    Failed { reason: String },

    /// The monitor was cancelled by shutdown before finishing.
    Interrupted,
}

impl MonitorOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ApiError::transient("connection reset").is_transient());
        assert!(!ApiError::InvalidCredentials.is_transient());
        assert!(!ApiError::fatal("validation rejected").is_transient());
    }

    #[test]
    fn outcome_failure_detection() {
        assert!(MonitorOutcome::failed("bad credentials").is_failure());
        assert!(!MonitorOutcome::Completed.is_failure());
        assert!(!MonitorOutcome::Interrupted.is_failure());
    }
}
