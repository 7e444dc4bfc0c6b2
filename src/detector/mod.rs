//! Task-completion detection engine
//!
//! This module is organized into logical submodules:
//! - `config`: per-session tracking configuration and defaults
//! - `session`: per-client episode state (phase, timer, watcher handles)
//! - `analysis`: file-pattern and keyword heuristics
//!
//! One tracking session exists per tracked client. The session arms an idle
//! timer and, when enabled, a file watcher; any completion condition (idle
//! expiry, file-analysis match, manual signal, process exit) closes the session
//! and emits exactly one `TaskCompleted` event. Further detection for the same
//! client requires a new `start_tracking` call.

mod analysis;
mod config;
mod session;

pub use config::TrackingConfig;

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use session::{SessionPhase, TrackingSession};

use crate::bus::EventBus;
use crate::error::{MonitorError, Result};
use crate::store::ClientStore;
use crate::types::{
    ClientId, ClientStatus, CompletionDetails, CompletionEvent, CompletionTrigger, FileChangeKind,
    MonitorEvent, TaskRecord,
};
use crate::watcher::{self, FileChange};

/// Per-client completion detector
///
/// Cheap to clone; clones share the same session map, store, and bus.
#[derive(Clone)]
pub struct CompletionDetector {
    store: Arc<ClientStore>,
    bus: Arc<EventBus>,
    sessions: Arc<Mutex<HashMap<ClientId, TrackingSession>>>,
}

impl CompletionDetector {
    /// Create a detector over the given store and bus
    #[must_use]
    pub fn new(store: Arc<ClientStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Begin a completion-detection episode for a registered client
    ///
    /// Arms the idle timer and, when `monitor_file_changes` is set, a watcher
    /// subscription over the configured paths (falling back to the client's
    /// working directory). Re-tracking an already-tracked client replaces the
    /// previous session, tearing down its timer and subscription first. A
    /// watcher failure downgrades the session to idle-only detection.
    pub async fn start_tracking(&self, id: &ClientId, mut config: TrackingConfig) -> Result<()> {
        let Some(entity) = self.store.get(id).await else {
            log::warn!("Cannot start tracking unknown client {id}");
            return Err(MonitorError::not_found(id.as_str()));
        };

        if config.watch_paths.is_empty()
            && let Some(dir) = entity.context.working_dir
        {
            config.watch_paths.push(dir);
        }

        let mut sessions = self.sessions.lock().await;
        if sessions.remove(id).is_some() {
            log::debug!("Replacing tracking session for client {id}");
        }

        let mut session = TrackingSession::new(id.clone(), config);
        self.arm_timer(&mut session);

        if session.config.monitor_file_changes {
            if session.config.watch_paths.is_empty() {
                log::debug!("Client {id} has no watch paths; idle detection only");
            } else {
                match watcher::watch(&session.config.watch_paths, &session.config.ignore_patterns)
                {
                    Ok(mut subscription) => {
                        let detector = self.clone();
                        let client_id = id.clone();
                        session.watch_task = Some(tokio::spawn(async move {
                            while let Some(change) = subscription.next_change().await {
                                detector.on_file_change(&client_id, change).await;
                            }
                        }));
                    }
                    Err(e) => {
                        log::warn!(
                            "File monitoring unavailable for client {id}: {e}; idle detection only"
                        );
                    }
                }
            }
        }

        sessions.insert(id.clone(), session);
        log::info!("Tracking started for client {id}");
        Ok(())
    }

    /// Stop a tracking episode without emitting anything
    ///
    /// Cancels the idle timer and watcher unconditionally. Safe from any
    /// state: calling before `start_tracking`, after completion, or twice in a
    /// row is a no-op. Returns whether a live session was closed.
    pub async fn stop_tracking(&self, id: &ClientId) -> bool {
        // Dropping the session aborts its timer and watcher task.
        match self.sessions.lock().await.remove(id) {
            Some(_session) => {
                log::debug!("Tracking stopped for client {id}");
                true
            }
            None => false,
        }
    }

    /// Stop every tracking episode; returns how many were closed
    pub async fn stop_all(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let count = sessions.len();
        sessions.clear();
        count
    }

    /// Whether a client currently has a live tracking session
    pub async fn is_tracking(&self, id: &ClientId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }

    /// Number of live tracking sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Record non-file activity (manual ping, request increment)
    ///
    /// Resets the idle timer while the session is open; never closes it.
    pub async fn record_activity(&self, id: &ClientId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get_mut(id)
            && session.phase != SessionPhase::Completed
        {
            log::debug!("Activity for client {id}; idle timer reset");
            self.arm_timer(session);
        }
    }

    /// Explicit completion signal
    ///
    /// Emits a `manual` completion event and closes the session. Calling after
    /// the session already completed, or without a session, is a no-op.
    /// Returns whether an event fired.
    pub async fn mark_task_completed(&self, id: &ClientId, reason: Option<String>) -> bool {
        let session = self.sessions.lock().await.remove(id);
        match session {
            Some(session) => {
                self.finish(
                    session,
                    CompletionTrigger::Manual,
                    CompletionDetails::Manual { reason },
                )
                .await;
                true
            }
            None => {
                log::debug!("Manual completion for client {id} without a session; ignoring");
                false
            }
        }
    }

    /// External process-exit signal
    ///
    /// Emits a `process_completion` event and closes the session. No-op
    /// without a live session. Returns whether an event fired.
    pub async fn notify_process_exit(&self, id: &ClientId, exit_code: i32) -> bool {
        let session = self.sessions.lock().await.remove(id);
        match session {
            Some(session) => {
                self.finish(
                    session,
                    CompletionTrigger::ProcessCompletion,
                    CompletionDetails::ProcessExit { exit_code },
                )
                .await;
                true
            }
            None => false,
        }
    }

    /// Cancel any running idle timer and schedule a fresh one
    fn arm_timer(&self, session: &mut TrackingSession) {
        if let Some(timer) = session.idle_timer.take() {
            timer.abort();
        }
        session.timer_epoch += 1;
        let epoch = session.timer_epoch;
        let timeout = session.config.idle_timeout;
        let detector = self.clone();
        let client_id = session.client_id.clone();
        session.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            detector.on_idle_expired(&client_id, epoch).await;
        }));
    }

    /// Idle timer callback
    ///
    /// The epoch guard drops timers that fired concurrently with a reset:
    /// cancellation prevents most stale callbacks, and any that slipped past
    /// carry an outdated epoch.
    async fn on_idle_expired(&self, id: &ClientId, epoch: u64) {
        let session = {
            let mut sessions = self.sessions.lock().await;
            let current = sessions
                .get(id)
                .is_some_and(|s| s.timer_epoch == epoch && s.phase != SessionPhase::Completed);
            if current { sessions.remove(id) } else { None }
        };

        if let Some(session) = session {
            log::info!("Idle timeout expired for client {id}");
            let idle_ms = session.config.idle_timeout.as_millis() as u64;
            self.finish(
                session,
                CompletionTrigger::IdleTimeout,
                CompletionDetails::Idle { idle_ms },
            )
            .await;
        }
    }

    /// Watcher callback for one normalized file change
    ///
    /// Always counts as activity (timer reset, `FileChanged` event). When the
    /// path matches a completion pattern the file content is inspected off the
    /// session lock; a keyword hit closes the session with a `file_analysis`
    /// completion.
    pub(crate) async fn on_file_change(&self, id: &ClientId, change: FileChange) {
        self.store.touch(id).await;
        self.bus.publish(&MonitorEvent::FileChanged {
            client_id: id.clone(),
            path: change.path.clone(),
            change: change.kind,
            timestamp: Utc::now(),
        });

        let keywords = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(id) else {
                return;
            };
            if session.phase == SessionPhase::Completed {
                return;
            }

            self.arm_timer(session);
            session.phase = SessionPhase::Armed;

            if change.kind == FileChangeKind::Removed {
                return;
            }
            if !analysis::path_matches(&session.config.completion_file_patterns, &change.path) {
                return;
            }

            session.phase = SessionPhase::Evaluating;
            session.last_matched_file = Some(change.path.clone());
            session.config.completion_keywords.clone()
        };

        // Content inspection happens outside the lock so a slow read never
        // blocks timers or other clients.
        let matched = analysis::scan_file(&change.path, &keywords).await;

        let session = {
            let mut sessions = self.sessions.lock().await;
            let Some(session) = sessions.get_mut(id) else {
                return;
            };
            if session.phase == SessionPhase::Completed {
                return;
            }
            if matched.is_empty() {
                session.phase = SessionPhase::Armed;
                return;
            }
            sessions.remove(id)
        };

        if let Some(session) = session {
            log::info!(
                "Completion keywords {:?} found in {} for client {id}",
                matched,
                change.path.display()
            );
            self.finish(
                session,
                CompletionTrigger::FileAnalysis,
                CompletionDetails::FileMatch {
                    file: change.path,
                    matched_keywords: matched,
                },
            )
            .await;
        }
    }

    /// Close an episode and emit its single completion event
    ///
    /// The session has already been removed from the map, so no concurrent
    /// path can observe or complete it again. Dropping it at the end cancels
    /// the idle timer and watcher task.
    async fn finish(
        &self,
        mut session: TrackingSession,
        trigger: CompletionTrigger,
        details: CompletionDetails,
    ) {
        session.phase = SessionPhase::Completed;
        let client_id = session.client_id.clone();

        // Only a running client can move to Completed; anything else is a
        // logged no-op inside the state machine.
        self.store
            .apply_transition(&client_id, ClientStatus::Completed)
            .await;

        let description = self
            .store
            .get(&client_id)
            .await
            .and_then(|e| e.context.current_task);
        self.store
            .record_completion(
                &client_id,
                TaskRecord {
                    description,
                    trigger,
                    completed_at: Utc::now(),
                },
            )
            .await;

        let episode_ms = Utc::now()
            .signed_duration_since(session.started_at)
            .num_milliseconds();
        log::info!("Task completion detected for client {client_id} ({trigger}) after {episode_ms}ms");
        if let Some(path) = &session.last_matched_file {
            log::debug!("Last matched file for {client_id}: {}", path.display());
        }
        self.bus.publish(&MonitorEvent::TaskCompleted(CompletionEvent {
            client_id,
            trigger,
            details,
            timestamp: Utc::now(),
        }));
    }
}
