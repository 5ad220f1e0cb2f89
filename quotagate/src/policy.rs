//! Soft-wait policy applied after each admission.

use std::time::Duration;

/// Fraction of the warning threshold where the middle tier starts.
pub const MODERATE_LOAD_RATIO: f64 = 0.7;
/// Base-wait multiple reached at the top of the middle tier.
pub const MODERATE_MULTIPLIER: f64 = 3.0;
/// Base-wait multiple reached at the top of the warning tier.
pub const WARNING_MULTIPLIER: f64 = 10.0;
/// Absolute cap on warning-tier waits.
pub const MAX_SOFT_WAIT: Duration = Duration::from_secs(30);

/// Computes how long an admitted caller pauses before returning.
pub trait BackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Wait for a caller admitted when `current` calls were already in the window.
    ///
    /// `hard_wait` is the wait the window itself would impose at the ceiling.
    fn soft_wait(&self, current: u32, base: Duration, hard_wait: Duration) -> Duration;
}

/// Four-tier graduated backoff.
///
/// | load                         | wait                           |
/// |------------------------------|--------------------------------|
/// | below 70% of warning         | base                           |
/// | 70% of warning .. warning    | base .. 3x base, linear        |
/// | warning .. ceiling           | 3x base .. 10x base, capped 30s|
/// | at or above ceiling          | hard wait                      |
///
/// Each tier starts where the previous one ends, so the wait never decreases
/// as load grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredBackoff {
    /// Ceiling of the window.
    pub max_calls: u32,
    /// Count where the warning tier starts.
    pub warning_threshold: u32,
}

impl TieredBackoff {
    /// Create a policy for the given ceiling and margin.
    #[must_use]
    pub fn new(max_calls: u32, safety_margin: u32) -> Self {
        Self {
            max_calls,
            warning_threshold: max_calls.saturating_sub(safety_margin),
        }
    }

    fn margin(&self) -> u32 {
        self.max_calls - self.warning_threshold
    }

    fn warning_cap(base: Duration) -> Duration {
        MAX_SOFT_WAIT.max(scale(base, MODERATE_MULTIPLIER))
    }

    fn warning_top(&self, base: Duration) -> Duration {
        scale(base, WARNING_MULTIPLIER).min(Self::warning_cap(base))
    }
}

impl BackoffPolicy for TieredBackoff {
    fn soft_wait(&self, current: u32, base: Duration, hard_wait: Duration) -> Duration {
        let moderate_start = f64::from(self.warning_threshold) * MODERATE_LOAD_RATIO;

        if current >= self.max_calls {
            hard_wait.max(self.warning_top(base))
        } else if current >= self.warning_threshold {
            let progress =
                f64::from(current - self.warning_threshold) / f64::from(self.margin());
            let factor =
                MODERATE_MULTIPLIER + progress * (WARNING_MULTIPLIER - MODERATE_MULTIPLIER);
            scale(base, factor).min(Self::warning_cap(base))
        } else if f64::from(current) >= moderate_start {
            let band = f64::from(self.warning_threshold) - moderate_start;
            let progress = (f64::from(current) - moderate_start) / band;
            scale(base, 1.0 + progress * (MODERATE_MULTIPLIER - 1.0))
        } else {
            base
        }
    }
}

/// `base * factor`, saturating at `Duration::MAX`.
fn scale(base: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(base.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const BASE: Duration = Duration::from_millis(500);
    const HARD: Duration = Duration::from_secs(45);

    fn policy() -> TieredBackoff {
        TieredBackoff::new(950, 50)
    }

    #[rstest]
    #[case(0, 500)]
    #[case(629, 500)]
    #[case(630, 500)]
    #[case(765, 1000)]
    #[case(900, 1500)]
    #[case(925, 3250)]
    #[case(949, 4930)]
    fn test_tiers(#[case] current: u32, #[case] expected_ms: u64) {
        let wait = policy().soft_wait(current, BASE, HARD);
        let diff = wait.as_millis().abs_diff(u128::from(expected_ms));
        assert!(diff <= 1, "current={current} wait={wait:?}");
    }

    #[test]
    fn test_at_ceiling_uses_hard_wait() {
        assert_eq!(policy().soft_wait(950, BASE, HARD), HARD);
        // Never below the warning tier's top even when the hard wait is short.
        assert_eq!(
            policy().soft_wait(950, BASE, Duration::from_secs(1)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_monotone_and_at_least_base() {
        for base in [Duration::ZERO, BASE, Duration::from_secs(4), Duration::from_secs(20)] {
            let mut previous = Duration::ZERO;
            for current in 0..=960 {
                let wait = policy().soft_wait(current, base, HARD);
                assert!(wait >= base, "base={base:?} current={current}");
                assert!(wait >= previous, "base={base:?} current={current}");
                previous = wait;
            }
        }
    }

    #[test]
    fn test_warning_cap() {
        let wait = policy().soft_wait(949, Duration::from_secs(5), HARD);
        assert_eq!(wait, MAX_SOFT_WAIT);
    }

    #[test]
    fn test_huge_base_saturates() {
        let base = Duration::MAX / 2;
        assert_eq!(policy().soft_wait(925, base, HARD), Duration::MAX);
        assert_eq!(policy().soft_wait(949, base, HARD), Duration::MAX);
        assert_eq!(policy().soft_wait(950, base, HARD), Duration::MAX);
    }

    #[test]
    fn test_zero_margin_skips_warning_tier() {
        let policy = TieredBackoff::new(10, 0);
        assert_eq!(policy.warning_threshold, 10);
        assert!(policy.soft_wait(9, BASE, HARD) < BASE * 3);
        assert_eq!(policy.soft_wait(10, BASE, HARD), HARD);
    }
}
