//! Sliding window of admission timestamps.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Extra time past the oldest entry's expiry before a hard wait ends.
pub const HARD_WAIT_GRACE: Duration = Duration::from_secs(1);
/// Shortest hard wait ever imposed.
pub const MIN_HARD_WAIT: Duration = Duration::from_secs(1);

/// Admission timestamps inside a trailing window, oldest first.
///
/// Entries are appended at the back and expire from the front, so the deque
/// stays sorted without any reordering.
#[derive(Debug, Clone)]
pub struct CallWindow {
    timestamps: VecDeque<Instant>,
    span: Duration,
}

impl CallWindow {
    /// Create an empty window of the given length.
    pub fn new(span: Duration, capacity: usize) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(capacity),
            span,
        }
    }

    /// Drop every entry whose age has reached the window length.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.timestamps.len();
        while let Some(&oldest) = self.timestamps.front() {
            if now.saturating_duration_since(oldest) >= self.span {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        before - self.timestamps.len()
    }

    /// Number of entries currently held. Call [`prune`](Self::prune) first.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether the window holds no entries.
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Oldest entry, if any.
    pub fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }

    /// Record an admission at `at`.
    ///
    /// Admissions always happen at the current instant, so `at` is never
    /// earlier than the newest entry and the deque stays sorted.
    pub fn record(&mut self, at: Instant) {
        debug_assert!(self.timestamps.back().map_or(true, |&last| last <= at));
        self.timestamps.push_back(at);
    }

    /// Insert `count` entries at an arbitrary instant, keeping order.
    pub fn insert_at(&mut self, at: Instant, count: usize) {
        let pos = self.timestamps.partition_point(|&ts| ts <= at);
        for _ in 0..count {
            self.timestamps.insert(pos, at);
        }
    }

    /// Time until the oldest entry has been expired for [`HARD_WAIT_GRACE`].
    ///
    /// An empty window yields the full span plus grace; the result is never
    /// shorter than [`MIN_HARD_WAIT`].
    pub fn hard_wait(&self, now: Instant) -> Duration {
        let age = self
            .oldest()
            .map(|oldest| now.saturating_duration_since(oldest))
            .unwrap_or(Duration::ZERO);
        self.span
            .saturating_add(HARD_WAIT_GRACE)
            .saturating_sub(age)
            .max(MIN_HARD_WAIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_prune_boundary() {
        let start = Instant::now();
        let mut window = CallWindow::new(MINUTE, 4);
        window.record(start);

        assert_eq!(window.prune(start + Duration::from_millis(59_999)), 0);
        assert_eq!(window.len(), 1);

        assert_eq!(window.prune(start + MINUTE), 1);
        assert!(window.is_empty());
    }

    #[test]
    fn test_prune_only_expired_front() {
        let start = Instant::now();
        let mut window = CallWindow::new(MINUTE, 4);
        window.record(start);
        window.record(start + Duration::from_secs(10));
        window.record(start + Duration::from_secs(30));

        assert_eq!(window.prune(start + Duration::from_secs(75)), 2);
        assert_eq!(window.len(), 1);
        assert_eq!(window.oldest(), Some(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_insert_at_keeps_order() {
        let start = Instant::now();
        let mut window = CallWindow::new(MINUTE, 8);
        window.record(start);
        window.record(start + Duration::from_secs(20));
        window.insert_at(start + Duration::from_secs(10), 3);

        assert_eq!(window.len(), 5);
        assert_eq!(window.oldest(), Some(start));
        assert_eq!(window.prune(start + Duration::from_secs(70)), 4);
        assert_eq!(window.oldest(), Some(start + Duration::from_secs(20)));
    }

    #[test]
    fn test_hard_wait() {
        let start = Instant::now();
        let mut window = CallWindow::new(MINUTE, 1);
        window.record(start);

        assert_eq!(window.hard_wait(start + Duration::from_secs(1)), Duration::from_secs(60));
        assert_eq!(window.hard_wait(start + Duration::from_secs(45)), Duration::from_secs(16));
        // Clamped once the oldest entry is almost gone.
        assert_eq!(window.hard_wait(start + Duration::from_millis(60_500)), MIN_HARD_WAIT);
    }

    #[test]
    fn test_hard_wait_empty() {
        let window = CallWindow::new(MINUTE, 0);
        assert_eq!(window.hard_wait(Instant::now()), MINUTE + HARD_WAIT_GRACE);
    }
}
