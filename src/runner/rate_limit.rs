//! Sliding-window rate limit on assistant invocations.
//!
//! Invocation times are kept in `LoopState::call_timestamps` so the window
//! survives restarts. Before each call, entries older than the window are
//! dropped; at the ceiling the caller waits until the oldest entry leaves the
//! window, plus a one-second margin.

use std::time::Duration;

use chrono::Utc;

/// One hour, in seconds
pub const WINDOW_SECS: f64 = 3600.0;

/// Added to the computed wait so the oldest call is safely outside the window
const MARGIN_SECS: f64 = 1.0;

/// Current time as fractional epoch seconds
pub fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Calls-per-hour ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    limit: usize,
    window_secs: f64,
}

impl RateLimiter {
    /// A limit of zero is treated as one call per window
    pub fn new(limit_per_hour: u32) -> Self {
        Self {
            limit: limit_per_hour.max(1) as usize,
            window_secs: WINDOW_SECS,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Drop timestamps that left the window as of `now`, along with any that
    /// lie in the future or aren't finite
    pub fn prune(&self, timestamps: &mut Vec<f64>, now: f64) {
        timestamps.retain(|t| t.is_finite() && *t <= now && now - t < self.window_secs);
    }

    /// Prune, then return how long to wait before the next call may start.
    /// `None` when under the ceiling.
    pub fn wait_needed(&self, timestamps: &mut Vec<f64>, now: f64) -> Option<Duration> {
        self.prune(timestamps, now);
        if timestamps.len() < self.limit {
            return None;
        }

        let oldest = timestamps.first().copied()?;
        let wait = self.window_secs - (now - oldest) + MARGIN_SECS;
        if wait > 0.0 {
            Duration::try_from_secs_f64(wait).ok()
        } else {
            None
        }
    }

    /// Record an invocation at `now`
    pub fn record(&self, timestamps: &mut Vec<f64>, now: f64) {
        timestamps.push(now);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(40)
    }
}
