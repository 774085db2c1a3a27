//! Persistent loop-controller state
//!
//! One `LoopState` is kept per ralph directory. The controller mutates it once
//! per iteration and writes it back to `state.json`, so counters and the rate
//! limit window survive restarts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lenient;

/// Circuit breaker position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitState {
    /// Normal operation
    #[default]
    Closed,
    /// Halted; only a state reset closes it again
    Open,
}

impl CircuitState {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitState::Open)
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
        }
    }
}

/// State carried across coder loop iterations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    /// Last completed iteration number (1-indexed, 0 = never ran)
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub iterations: u32,

    /// Iterations in a row that left the workspace unchanged
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub consecutive_no_progress: u32,

    /// Sentinel text of the most recent error, empty after a success
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub last_error: String,

    /// How many iterations in a row produced `last_error`
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub same_error_count: u32,

    /// Invocation times in epoch seconds, oldest first
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub call_timestamps: Vec<f64>,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub circuit_state: CircuitState,
}

impl LoopState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of an invocation by its error text.
    ///
    /// `None` means the assistant succeeded. A repeat of the previous error
    /// bumps the counter; a different error restarts it at 1.
    pub fn record_error(&mut self, error: Option<&str>) {
        match error {
            Some(text) if text == self.last_error => {
                self.same_error_count = self.same_error_count.saturating_add(1);
            }
            Some(text) => {
                self.last_error = text.to_string();
                self.same_error_count = 1;
            }
            None => {
                self.last_error.clear();
                self.same_error_count = 0;
            }
        }
    }

    /// Record whether the last iteration changed the workspace
    pub fn record_progress(&mut self, made_progress: bool) {
        if made_progress {
            self.consecutive_no_progress = 0;
        } else {
            self.consecutive_no_progress = self.consecutive_no_progress.saturating_add(1);
        }
    }

    /// Open the circuit
    pub fn trip(&mut self) {
        self.circuit_state = CircuitState::Open;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        let state = LoopState::new();
        assert_eq!(state.iterations, 0);
        assert_eq!(state.consecutive_no_progress, 0);
        assert!(state.last_error.is_empty());
        assert_eq!(state.same_error_count, 0);
        assert!(state.call_timestamps.is_empty());
        assert_eq!(state.circuit_state, CircuitState::Closed);
    }

    #[test]
    fn test_record_error_starts_at_one() {
        let mut state = LoopState::new();
        state.record_error(Some("ERROR: 'claude' command not found"));
        assert_eq!(state.last_error, "ERROR: 'claude' command not found");
        assert_eq!(state.same_error_count, 1);
    }

    #[test]
    fn test_record_error_repeat_increments() {
        let mut state = LoopState::new();
        state.record_error(Some("ERROR: boom"));
        state.record_error(Some("ERROR: boom"));
        state.record_error(Some("ERROR: boom"));
        assert_eq!(state.same_error_count, 3);
    }

    #[test]
    fn test_record_error_different_resets() {
        let mut state = LoopState::new();
        state.record_error(Some("ERROR: boom"));
        state.record_error(Some("ERROR: boom"));
        state.record_error(Some("ERROR: bang"));
        assert_eq!(state.last_error, "ERROR: bang");
        assert_eq!(state.same_error_count, 1);
    }

    #[test]
    fn test_record_success_clears_error() {
        let mut state = LoopState::new();
        state.record_error(Some("ERROR: boom"));
        state.record_error(None);
        assert!(state.last_error.is_empty());
        assert_eq!(state.same_error_count, 0);
    }

    #[test]
    fn test_record_progress() {
        let mut state = LoopState::new();
        state.record_progress(false);
        state.record_progress(false);
        assert_eq!(state.consecutive_no_progress, 2);
        state.record_progress(true);
        assert_eq!(state.consecutive_no_progress, 0);
    }

    #[test]
    fn test_counters_saturate() {
        let mut state = LoopState {
            consecutive_no_progress: u32::MAX,
            last_error: "ERROR: boom".to_string(),
            same_error_count: u32::MAX,
            ..Default::default()
        };
        state.record_progress(false);
        state.record_error(Some("ERROR: boom"));
        assert_eq!(state.consecutive_no_progress, u32::MAX);
        assert_eq!(state.same_error_count, u32::MAX);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut state = LoopState::new();
        state.trip();
        let json = serde_json::to_value(&state).unwrap();
        for key in [
            "iterations",
            "consecutive_no_progress",
            "last_error",
            "same_error_count",
            "call_timestamps",
            "circuit_state",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["circuit_state"], "open");
    }

    #[test]
    fn test_wrong_typed_fields_fall_back() {
        let state: LoopState =
            serde_json::from_str(r#"{"iterations": "four", "circuit_state": "half-open", "same_error_count": 2}"#)
                .unwrap();
        assert_eq!(state.iterations, 0);
        assert_eq!(state.circuit_state, CircuitState::Closed);
        assert_eq!(state.same_error_count, 2);
    }
}
