//! Limiter error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring or installing a limiter.
///
/// Admission itself never fails; every variant here is a construction-time
/// problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The ceiling must admit at least one call.
    #[error("max_calls_per_window must be greater than zero")]
    ZeroCeiling,

    /// The safety margin leaves no room below the ceiling.
    #[error("safety margin {margin} must be smaller than the ceiling {max}")]
    MarginTooLarge {
        /// Configured safety margin.
        margin: u32,
        /// Configured ceiling.
        max: u32,
    },

    /// The sliding window has no length.
    #[error("window duration must be non-zero")]
    ZeroWindow,

    /// The base wait is longer than the window it paces.
    #[error("base wait {base_wait:?} exceeds the window {window:?}")]
    BaseWaitTooLong {
        /// Configured base wait.
        base_wait: Duration,
        /// Configured window length.
        window: Duration,
    },

    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
    },

    /// The process-wide limiter was already initialized.
    #[error("global rate limiter is already installed")]
    AlreadyInstalled,
}

impl GateError {
    /// Create an environment parse error.
    pub fn invalid_env(var: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var,
            value: value.into(),
        }
    }

    /// Check if this error comes from the configuration values themselves.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ZeroCeiling
                | Self::MarginTooLarge { .. }
                | Self::ZeroWindow
                | Self::BaseWaitTooLong { .. }
        )
    }
}

/// Result type for limiter setup.
pub type GateResult<T> = Result<T, GateError>;
