//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being handled by the network transport
//! - Let shutdown wait for in-flight work to drain, with a deadline
//! - Feed the in-flight gauge and the listener health check

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Tracks in-flight requests for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker {
    active_count: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> RequestGuard {
        let now = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_inflight_requests(now);
        RequestGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Current in-flight request count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no requests are in flight. Returns false if `timeout` elapsed first.
    pub async fn wait_for_idle(&self, timeout: Duration) -> bool {
        let drained = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Guard that tracks a request's lifetime.
/// Decrements active count when dropped, even if the handler panics.
#[derive(Debug)]
pub struct RequestGuard {
    active_count: Arc<AtomicU64>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let now = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_inflight_requests(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_counts() {
        let tracker = RequestTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.clone().track();
        assert_eq!(tracker.active_count(), 2);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn wait_for_idle_honours_deadline() {
        let tracker = RequestTracker::new();
        assert!(tracker.wait_for_idle(Duration::from_millis(10)).await);

        let guard = tracker.track();
        assert!(!tracker.wait_for_idle(Duration::from_millis(100)).await);

        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });
        assert!(tracker.wait_for_idle(Duration::from_secs(2)).await);
        releaser.await.unwrap();
    }
}
