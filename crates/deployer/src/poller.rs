use crate::utils::loop_heartbeats::LoopHeartbeats;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use shared::models::model::DeployedModelView;
use shared::provider::ModelCatalog;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardSnapshot {
    pub models: Vec<DeployedModelView>,
    pub loading: bool,
    pub refreshing: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Generation of the fetch that produced `models`/`error`; 0 before any.
    pub generation: u64,
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            loading: true,
            refreshing: false,
            error: None,
            last_updated: None,
            generation: 0,
        }
    }
}

/// Keeps a dashboard snapshot of the provider's deployed models fresh.
///
/// Every fetch takes the next generation number and its result is applied
/// only if no newer fetch was issued in the meantime, so an overlapping
/// manual refresh can never be overwritten by an older scheduled one.
pub struct StatusPoller {
    catalog: Arc<dyn ModelCatalog>,
    interval: Duration,
    state: RwLock<DashboardSnapshot>,
    issued: AtomicU64,
    in_flight: AtomicUsize,
    stop_token: CancellationToken,
    heartbeats: Option<Arc<LoopHeartbeats>>,
}

impl StatusPoller {
    pub fn new(
        catalog: Arc<dyn ModelCatalog>,
        interval: Duration,
        heartbeats: Option<Arc<LoopHeartbeats>>,
    ) -> Self {
        Self {
            catalog,
            interval,
            state: RwLock::new(DashboardSnapshot::default()),
            issued: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            stop_token: CancellationToken::new(),
            heartbeats,
        }
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.state.read().await.clone()
    }

    /// Fetches the model list once. Returns whether the response was applied.
    pub async fn refresh(&self) -> bool {
        if self.stop_token.is_cancelled() {
            return false;
        }

        let generation = {
            let mut state = self.state.write().await;
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            state.refreshing = true;
            self.issued.fetch_add(1, Ordering::SeqCst) + 1
        };

        let result = self.catalog.list_models().await;

        let mut state = self.state.write().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        state.refreshing = self.in_flight.load(Ordering::SeqCst) > 0;
        if self.stop_token.is_cancelled() {
            debug!("Poller stopped, ignoring response for generation {generation}");
            return false;
        }
        state.loading = false;

        let latest = self.issued.load(Ordering::SeqCst);
        if generation != latest {
            debug!("Discarding stale model list (generation {generation}, latest {latest})");
            return false;
        }

        state.generation = generation;
        match result.into_result("Failed to fetch models") {
            Ok(models) => {
                debug!("Fetched {} deployed models", models.len());
                state.models = models;
                state.error = None;
                state.last_updated = Some(Utc::now());
            }
            Err(e) => {
                warn!("Model status refresh failed: {e}");
                state.error = Some(e);
            }
        }
        true
    }

    /// Refreshes immediately, then on every interval tick until [`stop`](Self::stop).
    pub async fn run(&self) -> Result<()> {
        if self.interval.is_zero() {
            bail!("Poll interval must be greater than zero");
        }
        let mut interval = interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Starting status poller with {:?} interval", self.interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh().await;
                    if let Some(heartbeats) = &self.heartbeats {
                        heartbeats.update_poller();
                    }
                }
                _ = self.stop_token.cancelled() => {
                    info!("Status poller stopped");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn stop(&self) {
        self.stop_token.cancel();
    }
}
