//! Limiter configuration.

use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default ceiling, leaving headroom under a 1000 calls/minute upstream quota.
pub const DEFAULT_MAX_CALLS: u32 = 950;
/// Default distance between the warning threshold and the ceiling.
pub const DEFAULT_SAFETY_MARGIN: u32 = 50;
/// Default pause applied after every admitted call.
pub const DEFAULT_BASE_WAIT: Duration = Duration::from_millis(500);
/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Environment variable overriding [`LimiterConfig::max_calls_per_window`].
pub const ENV_MAX_CALLS: &str = "QUOTAGATE_MAX_CALLS";
/// Environment variable overriding [`LimiterConfig::safety_margin`].
pub const ENV_SAFETY_MARGIN: &str = "QUOTAGATE_SAFETY_MARGIN";
/// Environment variable overriding [`LimiterConfig::base_wait`], in milliseconds.
pub const ENV_BASE_WAIT_MS: &str = "QUOTAGATE_BASE_WAIT_MS";
/// Environment variable overriding [`LimiterConfig::window`], in seconds.
pub const ENV_WINDOW_SECS: &str = "QUOTAGATE_WINDOW_SECS";

/// Configuration for a [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Maximum admitted calls in any trailing window.
    pub max_calls_per_window: u32,
    /// Calls below the ceiling at which steep backoff starts.
    pub safety_margin: u32,
    /// Minimum pause after each admission.
    #[serde(with = "duration_secs")]
    pub base_wait: Duration,
    /// Length of the sliding window.
    #[serde(with = "duration_secs")]
    pub window: Duration,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_calls_per_window: DEFAULT_MAX_CALLS,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            base_wait: DEFAULT_BASE_WAIT,
            window: DEFAULT_WINDOW,
        }
    }
}

impl LimiterConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ceiling.
    pub fn max_calls(mut self, n: u32) -> Self {
        self.max_calls_per_window = n;
        self
    }

    /// Set the safety margin.
    pub fn safety_margin(mut self, n: u32) -> Self {
        self.safety_margin = n;
        self
    }

    /// Set the base wait.
    pub fn base_wait(mut self, wait: Duration) -> Self {
        self.base_wait = wait;
        self
    }

    /// Set the window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Config with no base wait, for callers that only want ceiling enforcement.
    pub fn unpaced() -> Self {
        Self::new().base_wait(Duration::ZERO)
    }

    /// Count at which the warning tier begins.
    pub fn warning_threshold(&self) -> u32 {
        self.max_calls_per_window.saturating_sub(self.safety_margin)
    }

    /// Check that the values describe a usable limiter.
    pub fn validate(&self) -> GateResult<()> {
        if self.max_calls_per_window == 0 {
            return Err(GateError::ZeroCeiling);
        }
        if self.safety_margin >= self.max_calls_per_window {
            return Err(GateError::MarginTooLarge {
                margin: self.safety_margin,
                max: self.max_calls_per_window,
            });
        }
        if self.window.is_zero() {
            return Err(GateError::ZeroWindow);
        }
        if self.base_wait > self.window {
            return Err(GateError::BaseWaitTooLong {
                base_wait: self.base_wait,
                window: self.window,
            });
        }
        Ok(())
    }

    /// Defaults overlaid with `QUOTAGATE_*` environment variables.
    ///
    /// Unset variables keep their defaults. The result is validated.
    pub fn from_env() -> GateResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> GateResult<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(n) = parse_var::<u32, _>(&lookup, ENV_MAX_CALLS)? {
            config.max_calls_per_window = n;
        }
        if let Some(n) = parse_var::<u32, _>(&lookup, ENV_SAFETY_MARGIN)? {
            config.safety_margin = n;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, ENV_BASE_WAIT_MS)? {
            config.base_wait = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, ENV_WINDOW_SECS)? {
            config.window = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> GateResult<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&'static str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| GateError::invalid_env(var, raw)),
    }
}

/// Durations as fractional seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
