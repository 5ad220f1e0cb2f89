//! Process-wide limiter instance.
//!
//! Prefer passing a [`RateLimiter`] handle to the code that needs it. These
//! helpers exist for call sites that cannot be threaded through, where every
//! caller must share one quota without agreeing on who owns the limiter.

use crate::config::LimiterConfig;
use crate::error::{GateError, GateResult};
use crate::limiter::RateLimiter;
use crate::stats::LimiterStats;
use std::sync::OnceLock;
use tracing::warn;

static GLOBAL_LIMITER: OnceLock<RateLimiter> = OnceLock::new();

/// Get the global limiter, creating it on first use.
///
/// The first call reads [`LimiterConfig::from_env`]; an invalid environment
/// is logged and replaced by the defaults.
pub fn global_limiter() -> &'static RateLimiter {
    GLOBAL_LIMITER.get_or_init(|| {
        let config = LimiterConfig::from_env().unwrap_or_else(|error| {
            warn!(%error, "Ignoring rate limiter environment overrides");
            LimiterConfig::default()
        });
        RateLimiter::new(config).unwrap_or_default()
    })
}

/// Install the global limiter with an explicit configuration.
///
/// Fails if the configuration is invalid or a global limiter already exists.
pub fn install_global(config: LimiterConfig) -> GateResult<&'static RateLimiter> {
    let limiter = RateLimiter::new(config)?;
    let mut installed = false;
    let global = GLOBAL_LIMITER.get_or_init(|| {
        installed = true;
        limiter
    });

    if installed {
        Ok(global)
    } else {
        Err(GateError::AlreadyInstalled)
    }
}

/// Wait on the global limiter before an upstream call.
pub async fn wait_for_api(label: &str) -> bool {
    global_limiter().acquire(label).await
}

/// Blocking variant of [`wait_for_api`].
pub fn wait_for_api_blocking(label: &str) -> bool {
    global_limiter().acquire_blocking(label)
}

/// Statistics of the global limiter.
pub fn api_statistics() -> LimiterStats {
    global_limiter().statistics()
}

/// Reset the global limiter's counters.
pub fn reset_api_statistics() {
    global_limiter().reset();
}
