//! The shared admission gate.

use crate::config::LimiterConfig;
use crate::error::GateResult;
use crate::policy::{BackoffPolicy, TieredBackoff};
use crate::stats::LimiterStats;
use crate::window::CallWindow;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// Admissions between periodic usage reports.
const REPORT_EVERY: u32 = 100;

/// Sliding-window admission controller shared by every caller of one upstream.
///
/// Cloning is cheap and every clone shares the same window, so a single
/// limiter can be handed to each worker that talks to the upstream.
///
/// Each acquire runs in four phases: a snapshot under the lock, an optional
/// hard wait without the lock, admission under the lock, and a soft wait
/// without the lock. The lock is never held while a caller sleeps.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    config: LimiterConfig,
    policy: Box<dyn BackoffPolicy>,
    state: Mutex<State>,
}

struct State {
    window: CallWindow,
    base_wait: Duration,
    total_calls: u64,
    blocked_calls: u64,
    started_at: Instant,
}

impl State {
    fn current(&mut self, now: Instant) -> u32 {
        self.window.prune(now);
        u32::try_from(self.window.len()).unwrap_or(u32::MAX)
    }
}

/// Outcome of the admission phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// The call was recorded; pause this long before returning.
    Admitted { pause: Duration },
    /// The window filled up again; wait this long and retry.
    Full { wait: Duration },
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.inner.config)
            .field("policy", &self.inner.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        let config = LimiterConfig::default();
        let policy = TieredBackoff::new(config.max_calls_per_window, config.safety_margin);
        Self::build(config, Box::new(policy))
    }
}

impl RateLimiter {
    /// Create a limiter with the tiered backoff policy.
    pub fn new(config: LimiterConfig) -> GateResult<Self> {
        let policy = TieredBackoff::new(config.max_calls_per_window, config.safety_margin);
        Self::with_policy(config, policy)
    }

    /// Create a limiter with a custom soft-wait policy.
    pub fn with_policy(
        config: LimiterConfig,
        policy: impl BackoffPolicy + 'static,
    ) -> GateResult<Self> {
        config.validate()?;
        Ok(Self::build(config, Box::new(policy)))
    }

    fn build(config: LimiterConfig, policy: Box<dyn BackoffPolicy>) -> Self {
        info!(
            max_calls = config.max_calls_per_window,
            warning_threshold = config.warning_threshold(),
            base_wait_ms = config.base_wait.as_millis() as u64,
            window_secs = config.window.as_secs_f64(),
            "Rate limiter initialized"
        );

        let state = State {
            window: CallWindow::new(config.window, config.max_calls_per_window as usize),
            base_wait: config.base_wait,
            total_calls: 0,
            blocked_calls: 0,
            started_at: Instant::now(),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                policy,
                state: Mutex::new(state),
            }),
        }
    }

    /// Configuration this limiter was built with.
    pub fn config(&self) -> &LimiterConfig {
        &self.inner.config
    }

    /// Count at which steep backoff begins.
    pub fn warning_threshold(&self) -> u32 {
        self.inner.config.warning_threshold()
    }

    /// Current minimum pause after each admission.
    pub fn base_wait(&self) -> Duration {
        self.inner.state.lock().base_wait
    }

    /// Override the minimum pause. Intended for diagnostics and tests.
    ///
    /// Waits longer than the window are clamped to the window length.
    pub fn set_base_wait(&self, wait: Duration) {
        let window = self.inner.config.window;
        if wait > window {
            warn!(
                requested_ms = wait.as_millis() as u64,
                window_ms = window.as_millis() as u64,
                "Base wait longer than the window, clamping"
            );
        }
        let wait = wait.min(window);
        self.inner.state.lock().base_wait = wait;
        debug!(base_wait_ms = wait.as_millis() as u64, "Base wait overridden");
    }

    /// Wait until one upstream call may be issued, then record it.
    ///
    /// Always returns `true`; a saturated window delays the caller instead of
    /// rejecting it.
    pub async fn acquire(&self, label: &str) -> bool {
        self.acquire_inner(label, None).await
    }

    /// Like [`acquire`](Self::acquire), but gives up once `deadline` would be
    /// passed while waiting for room in the window.
    ///
    /// Returns `false` without recording an admission when the window stays
    /// full past the deadline. The pause after admission is cut short at the
    /// deadline.
    pub async fn acquire_until(&self, label: &str, deadline: Instant) -> bool {
        self.acquire_inner(label, Some(deadline)).await
    }

    /// [`acquire_until`](Self::acquire_until) with a relative timeout.
    ///
    /// A timeout too large to represent as an instant means no deadline.
    pub async fn acquire_timeout(&self, label: &str, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        self.acquire_inner(label, deadline).await
    }

    async fn acquire_inner(&self, label: &str, deadline: Option<Instant>) -> bool {
        let mut hard_wait = self.begin(label);

        loop {
            if let Some(wait) = hard_wait {
                if exceeds(deadline, wait) {
                    debug!(label, wait_ms = wait.as_millis() as u64, "Deadline reached before admission");
                    return false;
                }
                sleep(wait).await;
            }

            match self.admit(label) {
                Admission::Admitted { pause } => {
                    match deadline {
                        Some(deadline) => {
                            let until = Instant::now()
                                .checked_add(pause)
                                .map_or(deadline, |end| end.min(deadline));
                            sleep_until(until).await
                        }
                        None => sleep(pause).await,
                    }
                    return true;
                }
                Admission::Full { wait } => hard_wait = Some(wait),
            }
        }
    }

    /// Blocking variant of [`acquire`](Self::acquire) for OS threads.
    ///
    /// Must not be called from inside an async runtime worker.
    pub fn acquire_blocking(&self, label: &str) -> bool {
        let mut hard_wait = self.begin(label);

        loop {
            if let Some(wait) = hard_wait {
                std::thread::sleep(wait);
            }

            match self.admit(label) {
                Admission::Admitted { pause } => {
                    std::thread::sleep(pause);
                    return true;
                }
                Admission::Full { wait } => hard_wait = Some(wait),
            }
        }
    }

    /// Admit immediately if the window has room, without any waiting.
    ///
    /// Returns `false` and counts the call as blocked when the window is full.
    pub fn try_acquire(&self, label: &str) -> bool {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let current = state.current(now);
        state.total_calls += 1;

        if current >= self.inner.config.max_calls_per_window {
            state.blocked_calls += 1;
            warn!(
                label,
                current,
                max = self.inner.config.max_calls_per_window,
                "API call ceiling reached, rejecting non-blocking acquire"
            );
            return false;
        }

        let pause = self.soft_wait(&state, current, now);
        state.window.record(now);
        drop(state);

        self.report(label, current, pause);
        true
    }

    /// Phase one: count the invocation and decide whether a hard wait is needed.
    fn begin(&self, label: &str) -> Option<Duration> {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let current = state.current(now);
        state.total_calls += 1;

        if current < self.inner.config.max_calls_per_window {
            return None;
        }

        state.blocked_calls += 1;
        let wait = state.window.hard_wait(now);
        warn!(
            label,
            current,
            max = self.inner.config.max_calls_per_window,
            wait_ms = wait.as_millis() as u64,
            "API call ceiling reached, holding caller"
        );
        Some(wait)
    }

    /// Phase three: re-count and record the admission if the window has room.
    fn admit(&self, label: &str) -> Admission {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let current = state.current(now);

        if current >= self.inner.config.max_calls_per_window {
            let wait = state.window.hard_wait(now);
            debug!(
                label,
                current,
                wait_ms = wait.as_millis() as u64,
                "Window still full after hard wait"
            );
            return Admission::Full { wait };
        }

        let pause = self.soft_wait(&state, current, now);
        state.window.record(now);
        drop(state);

        self.report(label, current, pause);
        Admission::Admitted { pause }
    }

    fn soft_wait(&self, state: &State, current: u32, now: Instant) -> Duration {
        let hard_wait = state.window.hard_wait(now);
        self.inner
            .policy
            .soft_wait(current, state.base_wait, hard_wait)
            .max(state.base_wait)
    }

    fn report(&self, label: &str, current: u32, pause: Duration) {
        let max = self.inner.config.max_calls_per_window;
        let remaining = max.saturating_sub(current);

        if current >= self.warning_threshold() {
            warn!(
                label,
                current,
                max,
                remaining,
                wait_ms = pause.as_millis() as u64,
                "API call rate approaching ceiling"
            );
        } else if (current + 1) % REPORT_EVERY == 0 {
            info!(current = current + 1, max, remaining = remaining - 1, "API call window usage");
        }
    }

    /// Calls admitted within the trailing window.
    pub fn current_count(&self) -> u32 {
        self.inner.state.lock().current(Instant::now())
    }

    /// Calls still available before the ceiling.
    pub fn remaining(&self) -> u32 {
        self.inner
            .config
            .max_calls_per_window
            .saturating_sub(self.current_count())
    }

    /// Pause the policy would impose on a call admitted right now.
    pub fn dynamic_wait(&self) -> Duration {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let current = state.current(now);
        self.soft_wait(&state, current, now)
    }

    /// Snapshot of the window and counters. Does not count as a call.
    pub fn statistics(&self) -> LimiterStats {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let current = state.current(now);
        let uptime = now.saturating_duration_since(state.started_at);

        LimiterStats::new(
            current,
            self.inner.config.max_calls_per_window,
            state.total_calls,
            state.blocked_calls,
            uptime.as_secs_f64(),
        )
    }

    /// Zero the reporting counters and restart the uptime clock.
    ///
    /// The window itself is kept, so calls made before the reset still count
    /// against the ceiling.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        state.total_calls = 0;
        state.blocked_calls = 0;
        state.started_at = Instant::now();
        drop(state);
        info!("Rate limiter statistics reset");
    }

    /// Record `count` synthetic admissions at `at`.
    ///
    /// Used to warm the window from an external record of recent calls, and
    /// by tests to simulate load. Does not touch the counters. Instants in
    /// the future are treated as now.
    pub fn preload(&self, count: usize, at: Instant) {
        let at = at.min(Instant::now());
        self.inner.state.lock().window.insert_at(at, count);
    }
}

fn exceeds(deadline: Option<Instant>, wait: Duration) -> bool {
    deadline.is_some_and(|deadline| {
        Instant::now()
            .checked_add(wait)
            .map_or(true, |end| end > deadline)
    })
}
