//! Circuit breaker - halts the loop when it stops making headway

use std::fmt;

use crate::domain::LoopState;

pub const DEFAULT_NO_PROGRESS_THRESHOLD: u32 = 3;
pub const DEFAULT_SAME_ERROR_THRESHOLD: u32 = 5;

/// Why the circuit is open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripReason {
    /// N iterations in a row left the workspace unchanged
    NoProgress(u32),
    /// The same error text came back N times in a row
    RepeatedError { count: u32, error: String },
    /// Persisted state was already open when the loop started
    AlreadyOpen,
}

impl fmt::Display for TripReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripReason::NoProgress(n) => write!(f, "{} consecutive iterations without progress", n),
            TripReason::RepeatedError { count, error } => {
                write!(f, "same error repeated {} times: {}", count, error)
            }
            TripReason::AlreadyOpen => f.write_str("circuit already open (run `ralph reset` to close it)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub no_progress_threshold: u32,
    pub same_error_threshold: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            no_progress_threshold: DEFAULT_NO_PROGRESS_THRESHOLD,
            same_error_threshold: DEFAULT_SAME_ERROR_THRESHOLD,
        }
    }
}

impl CircuitBreaker {
    pub fn new(no_progress_threshold: u32, same_error_threshold: u32) -> Self {
        Self {
            no_progress_threshold,
            same_error_threshold,
        }
    }

    /// Whether counters in `state` have reached a threshold.
    ///
    /// Stagnation is checked before repeated errors; an already open circuit
    /// is reported only when neither threshold explains it.
    pub fn check(&self, state: &LoopState) -> Option<TripReason> {
        if state.consecutive_no_progress >= self.no_progress_threshold {
            return Some(TripReason::NoProgress(state.consecutive_no_progress));
        }
        if state.same_error_count >= self.same_error_threshold {
            return Some(TripReason::RepeatedError {
                count: state.same_error_count,
                error: state.last_error.clone(),
            });
        }
        if state.circuit_state.is_open() {
            return Some(TripReason::AlreadyOpen);
        }
        None
    }
}
