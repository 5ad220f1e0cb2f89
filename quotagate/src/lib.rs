//! # quotagate
//!
//! Process-wide admission control for rate-limited upstream APIs.
//!
//! A [`RateLimiter`] counts admitted calls in a sliding window shared by any
//! number of threads or tasks. Callers wait before each upstream request; the
//! limiter never lets the window exceed its ceiling and slows callers down
//! gradually as the window fills.
//!
//! ## Core Concepts
//!
//! - **[`LimiterConfig`]**: ceiling, safety margin, base wait, window length
//! - **[`RateLimiter`]**: the shared gate; `acquire`, `statistics`, `reset`
//! - **[`BackoffPolicy`]**: how long an admitted caller pauses
//! - **[`LimiterStats`]**: point-in-time snapshot of the window and counters
//! - **[`global_limiter`]**: lazily created process-wide instance
//!
//! ## Wait Behavior
//!
//! - Below 70% of the warning threshold, every call pauses for the base wait.
//! - Approaching the warning threshold, the pause grows to 3x the base wait.
//! - Past the warning threshold, it grows to 10x the base wait, capped at 30s.
//! - At the ceiling, callers hold until the oldest call leaves the window.
//!
//! ## Example
//!
//! ```ignore
//! use quotagate::{LimiterConfig, RateLimiter};
//!
//! let limiter = RateLimiter::new(
//!     LimiterConfig::new().max_calls(950).safety_margin(50),
//! )?;
//!
//! limiter.acquire("daily_quotes").await;
//! // issue the upstream request
//!
//! println!("{}", limiter.statistics());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod global;
pub mod limiter;
pub mod policy;
pub mod stats;
pub mod window;

// Re-exports
pub use config::LimiterConfig;
pub use error::{GateError, GateResult};
pub use global::{
    api_statistics, global_limiter, install_global, reset_api_statistics, wait_for_api,
    wait_for_api_blocking,
};
pub use limiter::RateLimiter;
pub use policy::{BackoffPolicy, TieredBackoff};
pub use stats::LimiterStats;
pub use window::CallWindow;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        global_limiter, wait_for_api, GateError, GateResult, LimiterConfig, LimiterStats,
        RateLimiter,
    };
}
