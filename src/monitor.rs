//! Session monitor facade
//!
//! Wires the entity store, completion detector, metrics sampler, and event bus
//! together and exposes the inbound contract consumed by the host protocol
//! layer. Owns the periodic sweep that disconnects clients with no recent
//! activity.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::detector::{CompletionDetector, TrackingConfig};
use crate::error::Result;
use crate::metrics::{DEFAULT_SAMPLE_PERIOD, MetricsSampler};
use crate::store::{ClientStore, DEFAULT_HISTORY_CAPACITY, StatusChange};
use crate::types::{ClientEntity, ClientId, ClientStatus, NewClient};

// ============================================================================
// OPTIONS
// ============================================================================

/// Configuration for a [`SessionMonitor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorOptions {
    /// Disconnected clients retained in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Period of the process-wide metrics sampler
    #[serde(default = "default_sample_period")]
    pub sample_period: Duration,
    /// How often the inactive-client sweep runs
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,
    /// Inactivity span after which a client is swept as disconnected
    #[serde(default = "default_inactive_timeout")]
    pub inactive_timeout: Duration,
    /// Tracking configuration used by [`SessionMonitor::start_tracking`]
    #[serde(default)]
    pub default_tracking: TrackingConfig,
    /// Start a kind-tuned tracking session automatically on registration
    #[serde(default = "default_auto_track")]
    pub auto_track: bool,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_sample_period() -> Duration {
    DEFAULT_SAMPLE_PERIOD
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_inactive_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_auto_track() -> bool {
    true
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            sample_period: default_sample_period(),
            sweep_interval: default_sweep_interval(),
            inactive_timeout: default_inactive_timeout(),
            default_tracking: TrackingConfig::default(),
            auto_track: default_auto_track(),
        }
    }
}

impl MonitorOptions {
    /// Start building options from the defaults
    #[must_use]
    pub fn builder() -> MonitorOptionsBuilder {
        MonitorOptionsBuilder::default()
    }
}

/// Builder for [`MonitorOptions`]
#[derive(Debug, Default)]
pub struct MonitorOptionsBuilder {
    options: MonitorOptions,
}

impl MonitorOptionsBuilder {
    /// Disconnected clients retained in history
    #[must_use]
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.options.history_capacity = capacity;
        self
    }

    /// Period of the process-wide metrics sampler
    #[must_use]
    pub fn sample_period(mut self, period: Duration) -> Self {
        self.options.sample_period = period;
        self
    }

    /// How often the inactive-client sweep runs
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.options.sweep_interval = interval;
        self
    }

    /// Inactivity span after which a client is swept as disconnected
    #[must_use]
    pub fn inactive_timeout(mut self, timeout: Duration) -> Self {
        self.options.inactive_timeout = timeout;
        self
    }

    /// Tracking configuration used by [`SessionMonitor::start_tracking`]
    #[must_use]
    pub fn default_tracking(mut self, config: TrackingConfig) -> Self {
        self.options.default_tracking = config;
        self
    }

    /// Start a kind-tuned tracking session automatically on registration
    #[must_use]
    pub fn auto_track(mut self, enabled: bool) -> Self {
        self.options.auto_track = enabled;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> MonitorOptions {
        self.options
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Aggregate snapshot returned by [`SessionMonitor::get_stats`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    /// Clients whose status is not `Disconnected`
    pub active_clients: usize,
    /// Live completion-tracking sessions
    pub tracking_sessions: usize,
    /// Live clients per status
    pub by_status: HashMap<ClientStatus, usize>,
    /// Entries in the disconnect history
    pub history_entries: usize,
    /// Events published on the bus since startup
    pub events_published: u64,
    /// When the monitor was created
    pub started_at: DateTime<Utc>,
}

// ============================================================================
// SESSION MONITOR
// ============================================================================

/// Facade over the session registry and completion detection engine
///
/// Construction spawns the metrics sampler and the inactive-client sweep;
/// call [`SessionMonitor::shutdown`] for a clean stop.
pub struct SessionMonitor {
    options: MonitorOptions,
    bus: Arc<EventBus>,
    store: Arc<ClientStore>,
    detector: CompletionDetector,
    sampler: MetricsSampler,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
    started_at: DateTime<Utc>,
}

impl SessionMonitor {
    /// Create a monitor and start its background tasks
    #[must_use]
    pub fn new(options: MonitorOptions) -> Self {
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(ClientStore::new(Arc::clone(&bus), options.history_capacity));
        let detector = CompletionDetector::new(Arc::clone(&store), Arc::clone(&bus));
        let sampler = MetricsSampler::new(
            Arc::clone(&store),
            Arc::clone(&bus),
            options.sample_period,
        );
        sampler.start();

        let sweep_handle = spawn_sweep(
            Arc::clone(&store),
            detector.clone(),
            options.sweep_interval,
            options.inactive_timeout,
        );

        Self {
            options,
            bus,
            store,
            detector,
            sampler,
            sweep_handle: Mutex::new(Some(sweep_handle)),
            started_at: Utc::now(),
        }
    }

    /// The bus downstream consumers subscribe on
    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Register a client
    ///
    /// When `auto_track` is set a kind-tuned tracking session starts
    /// immediately, so a client that never reports anything still gets idle
    /// detection.
    pub async fn register_client(&self, new_client: NewClient) -> Result<ClientEntity> {
        let entity = self.store.register(new_client).await?;

        if self.options.auto_track {
            let config = TrackingConfig::for_kind(&entity.kind);
            if let Err(e) = self.detector.start_tracking(&entity.id, config).await {
                log::warn!("Auto-tracking failed for client {}: {e}", entity.id);
            }
        }

        Ok(entity)
    }

    /// Unregister a client, tearing down any tracking session first
    ///
    /// Returns whether the client was known.
    pub async fn unregister_client(&self, id: &ClientId) -> bool {
        self.detector.stop_tracking(id).await;
        self.store.unregister(id).await.is_some()
    }

    /// Apply a status transition through the state machine
    ///
    /// Rejected or unknown transitions are logged no-ops. A transition into
    /// `Disconnected` also tears down tracking and removes the client.
    pub async fn apply_transition(
        &self,
        id: &ClientId,
        target: ClientStatus,
    ) -> Option<StatusChange> {
        let change = self.store.apply_transition(id, target).await?;
        if change.to == ClientStatus::Disconnected {
            self.detector.stop_tracking(id).await;
            self.store.unregister(id).await;
        }
        Some(change)
    }

    /// Count a request for a client; also resets its idle timer
    pub async fn increment_request(&self, id: &ClientId) {
        self.store.increment_request(id).await;
        self.detector.record_activity(id).await;
    }

    /// Count an error for a client; also resets its idle timer
    pub async fn increment_error(&self, id: &ClientId) {
        self.store.increment_error(id).await;
        self.detector.record_activity(id).await;
    }

    /// Start a tracking session with the monitor-wide default configuration
    pub async fn start_tracking(&self, id: &ClientId) -> Result<()> {
        self.detector
            .start_tracking(id, self.options.default_tracking.clone())
            .await
    }

    /// Start a tracking session with an explicit configuration
    pub async fn start_tracking_with(&self, id: &ClientId, config: TrackingConfig) -> Result<()> {
        self.detector.start_tracking(id, config).await
    }

    /// Stop a tracking session without emitting a completion event
    pub async fn stop_tracking(&self, id: &ClientId) -> bool {
        self.detector.stop_tracking(id).await
    }

    /// Explicitly mark the client's task as completed
    pub async fn mark_task_completed(&self, id: &ClientId, reason: Option<String>) -> bool {
        self.detector.mark_task_completed(id, reason).await
    }

    /// Report that the client's process exited
    pub async fn notify_process_exit(&self, id: &ClientId, exit_code: i32) -> bool {
        self.detector.notify_process_exit(id, exit_code).await
    }

    /// Look up a client snapshot
    pub async fn get_client(&self, id: &ClientId) -> Option<ClientEntity> {
        self.store.get(id).await
    }

    /// All clients whose status is not `Disconnected`
    pub async fn list_active(&self) -> Vec<ClientEntity> {
        self.store.list_active().await
    }

    /// Snapshot of the disconnect history, oldest first
    pub async fn history(&self) -> Vec<ClientEntity> {
        self.store.history().await
    }

    /// Aggregate monitor statistics
    pub async fn get_stats(&self) -> MonitorStats {
        let by_status = self.store.status_counts().await;
        let active_clients = by_status
            .iter()
            .filter(|(status, _)| **status != ClientStatus::Disconnected)
            .map(|(_, count)| *count)
            .sum();
        MonitorStats {
            active_clients,
            tracking_sessions: self.detector.session_count().await,
            by_status,
            history_entries: self.store.history().await.len(),
            events_published: self.bus.published(),
            started_at: self.started_at,
        }
    }

    /// Gracefully shut the monitor down
    ///
    /// Stops the sweep and sampler, cancels every tracking session, and
    /// unregisters all remaining clients.
    pub async fn shutdown(&self) {
        log::info!("Shutting down session monitor...");

        if let Some(handle) = self.sweep_handle.lock().take() {
            handle.abort();
        }
        self.sampler.stop();

        let cancelled = self.detector.stop_all().await;
        if cancelled > 0 {
            log::debug!("Cancelled {cancelled} tracking session(s)");
        }

        let ids: Vec<ClientId> = self
            .store
            .list_active()
            .await
            .into_iter()
            .map(|e| e.id)
            .collect();
        futures::future::join_all(ids.iter().map(|id| self.store.unregister(id))).await;

        log::info!("Session monitor shutdown complete");
    }
}

impl Default for SessionMonitor {
    fn default() -> Self {
        Self::new(MonitorOptions::default())
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep_handle.lock().take() {
            handle.abort();
        }
    }
}

/// Periodic task disconnecting clients with no recent activity
fn spawn_sweep(
    store: Arc<ClientStore>,
    detector: CompletionDetector,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the sweep
        // starts one full interval after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let stale = store.sweep_inactive(timeout).await;
            for entity in stale {
                log::info!(
                    "Client {} inactive since {}; disconnecting",
                    entity.id,
                    entity.last_activity_at
                );
                detector.stop_tracking(&entity.id).await;
                store.unregister(&entity.id).await;
            }
        }
    })
}
