//! Point-in-time limiter statistics.

use serde::Serialize;
use std::fmt;

/// Snapshot returned by [`RateLimiter::statistics`](crate::RateLimiter::statistics).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimiterStats {
    /// Calls admitted within the trailing window.
    pub current_count: u32,
    /// Configured ceiling.
    pub max_calls_per_window: u32,
    /// Calls still available before the ceiling.
    pub remaining: u32,
    /// Acquire invocations since construction or the last reset.
    pub total_calls: u64,
    /// Invocations that hit the ceiling.
    pub blocked_calls: u64,
    /// Seconds since construction or the last reset.
    pub uptime_seconds: f64,
    /// Average invocation rate over the uptime.
    pub calls_per_second: f64,
}

impl LimiterStats {
    pub(crate) fn new(
        current_count: u32,
        max_calls_per_window: u32,
        total_calls: u64,
        blocked_calls: u64,
        uptime_seconds: f64,
    ) -> Self {
        let calls_per_second = if uptime_seconds > 0.0 {
            total_calls as f64 / uptime_seconds
        } else {
            0.0
        };
        Self {
            current_count,
            max_calls_per_window,
            remaining: max_calls_per_window.saturating_sub(current_count),
            total_calls,
            blocked_calls,
            uptime_seconds,
            calls_per_second,
        }
    }

    /// Fraction of the ceiling currently in use.
    pub fn utilization(&self) -> f64 {
        f64::from(self.current_count) / f64::from(self.max_calls_per_window.max(1))
    }
}

impl fmt::Display for LimiterStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} in window ({} remaining), {} total, {} blocked, {:.2} calls/s over {:.1}s",
            self.current_count,
            self.max_calls_per_window,
            self.remaining,
            self.total_calls,
            self.blocked_calls,
            self.calls_per_second,
            self.uptime_seconds,
        )
    }
}
