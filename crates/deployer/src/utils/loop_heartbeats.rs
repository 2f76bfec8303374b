use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};

const STALE_AFTER_SECONDS: i64 = 120;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub poller_last_run_seconds_ago: i64,
}

/// Last completed iteration of each background loop, as a unix timestamp.
pub struct LoopHeartbeats {
    last_poller_iteration: AtomicI64,
    stale_after: i64,
}

impl Default for LoopHeartbeats {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopHeartbeats {
    pub fn new() -> Self {
        Self::with_threshold(STALE_AFTER_SECONDS)
    }

    /// The poller is reported unhealthy once its last run is `stale_after`
    /// seconds old. Callers polling slower than that should raise it.
    pub fn with_threshold(stale_after: i64) -> Self {
        Self {
            last_poller_iteration: AtomicI64::new(-1),
            stale_after,
        }
    }

    pub fn update_poller(&self) {
        self.last_poller_iteration
            .store(Utc::now().timestamp(), Ordering::SeqCst);
    }

    pub fn health_status(&self) -> HealthStatus {
        let now = Utc::now().timestamp();
        let poller_last = self.last_poller_iteration.load(Ordering::SeqCst);

        let poller_seconds_ago = if poller_last > 0 {
            now - poller_last
        } else {
            -1
        };

        HealthStatus {
            healthy: poller_seconds_ago != -1 && poller_seconds_ago < self.stale_after,
            poller_last_run_seconds_ago: poller_seconds_ago,
        }
    }
}
