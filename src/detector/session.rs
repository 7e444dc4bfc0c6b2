//! Tracking session state
//!
//! Per-client mutable state for one completion-detection episode. The idle
//! timer and watcher task are owned exclusively by the session and cancelled
//! when it is dropped, so a session removed from the detector map can never
//! leave a stray timer behind.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tokio::task::JoinHandle;

use super::config::TrackingConfig;
use crate::types::ClientId;

/// Detection phase of a tracking session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SessionPhase {
    /// Idle timer running; watcher live if enabled
    Armed,
    /// A matched file change is being inspected for keywords
    Evaluating,
    /// A completion condition fired; the session is closed
    Completed,
}

/// Per-client detector state for one episode
pub(super) struct TrackingSession {
    pub client_id: ClientId,
    pub config: TrackingConfig,
    pub phase: SessionPhase,
    /// Bumped on every timer reset; a fired timer carrying a stale epoch is
    /// ignored.
    pub timer_epoch: u64,
    pub idle_timer: Option<JoinHandle<()>>,
    pub watch_task: Option<JoinHandle<()>>,
    pub last_matched_file: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl TrackingSession {
    pub fn new(client_id: ClientId, config: TrackingConfig) -> Self {
        Self {
            client_id,
            config,
            phase: SessionPhase::Armed,
            timer_epoch: 0,
            idle_timer: None,
            watch_task: None,
            last_matched_file: None,
            started_at: Utc::now(),
        }
    }

    fn teardown(&mut self) {
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
        if let Some(task) = self.watch_task.take() {
            task.abort();
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
