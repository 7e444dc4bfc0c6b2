//! Client entity store
//!
//! Exclusive owner of all [`ClientEntity`] instances. Every other component
//! reads and mutates entities only through the accessors here; values returned
//! to callers are snapshots. All mutations are serialized behind one async
//! mutex with short critical sections, and bus events are published after the
//! lock is released.

mod transitions;

pub use transitions::{StatusChange, allowed_targets, is_allowed};

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::bus::EventBus;
use crate::error::Result;
use crate::types::{
    ClientEntity, ClientId, ClientMetrics, ClientStatus, MonitorEvent, NewClient, TaskRecord,
};

/// Default number of disconnected clients retained in history
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Store of live client entities plus a bounded disconnect history
pub struct ClientStore {
    clients: Mutex<HashMap<ClientId, ClientEntity>>,
    history: Mutex<VecDeque<ClientEntity>>,
    history_capacity: usize,
    bus: Arc<EventBus>,
}

impl ClientStore {
    /// Create an empty store publishing lifecycle events on `bus`
    #[must_use]
    pub fn new(bus: Arc<EventBus>, history_capacity: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            bus,
        }
    }

    /// Register a client
    ///
    /// Fails with [`crate::error::MonitorError::InvalidEntity`] if the id,
    /// display name, or custom kind label is empty; nothing is mutated in that
    /// case. Re-registering an existing id replaces the previous entity.
    /// Publishes `ClientConnected` and returns a snapshot of the new entity.
    pub async fn register(&self, new_client: NewClient) -> Result<ClientEntity> {
        new_client.validate()?;

        let entity = new_client.into_entity(Utc::now());
        let snapshot = entity.clone();

        let replaced = {
            let mut clients = self.clients.lock().await;
            clients.insert(entity.id.clone(), entity).is_some()
        };
        if replaced {
            log::info!("Client {} re-registered; previous entity replaced", snapshot.id);
        } else {
            log::info!("Client {} registered ({})", snapshot.id, snapshot.kind);
        }

        self.bus.publish(&MonitorEvent::ClientConnected {
            client_id: snapshot.id.clone(),
            name: snapshot.name.clone(),
            kind: snapshot.kind.clone(),
            timestamp: snapshot.connected_at,
        });

        Ok(snapshot)
    }

    /// Look up a client by id; never errors
    pub async fn get(&self, id: &ClientId) -> Option<ClientEntity> {
        self.clients.lock().await.get(id).cloned()
    }

    /// Remove a client from the live map
    ///
    /// The entity is marked `Disconnected` and archived into the bounded
    /// history (FIFO eviction). Publishes `ClientDisconnected`. Unknown ids are
    /// logged and ignored.
    pub async fn unregister(&self, id: &ClientId) -> Option<ClientEntity> {
        let mut entity = {
            let mut clients = self.clients.lock().await;
            match clients.remove(id) {
                Some(entity) => entity,
                None => {
                    log::warn!("Unregister for unknown client {id}; ignoring");
                    return None;
                }
            }
        };

        entity.status = ClientStatus::Disconnected;
        let snapshot = entity.clone();

        {
            let mut history = self.history.lock().await;
            if history.len() >= self.history_capacity {
                history.pop_front();
            }
            history.push_back(entity);
        }

        log::info!("Client {id} unregistered");
        self.bus.publish(&MonitorEvent::ClientDisconnected {
            client_id: id.clone(),
            timestamp: Utc::now(),
        });

        Some(snapshot)
    }

    /// Record client activity by bumping `last_activity_at`
    ///
    /// The timestamp never moves backwards. Unknown ids are logged and ignored.
    pub async fn touch(&self, id: &ClientId) {
        let mut clients = self.clients.lock().await;
        match clients.get_mut(id) {
            Some(entity) => {
                let now = Utc::now();
                if now > entity.last_activity_at {
                    entity.last_activity_at = now;
                }
            }
            None => log::warn!("Activity touch for unknown client {id}; ignoring"),
        }
    }

    /// All clients whose status is not `Disconnected`
    pub async fn list_active(&self) -> Vec<ClientEntity> {
        self.clients
            .lock()
            .await
            .values()
            .filter(|e| e.status != ClientStatus::Disconnected)
            .cloned()
            .collect()
    }

    /// Clients whose `last_activity_at` is strictly older than `timeout`
    ///
    /// The caller transitions the returned entities to `Disconnected`; the
    /// sweep itself mutates nothing.
    pub async fn sweep_inactive(&self, timeout: Duration) -> Vec<ClientEntity> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::MAX);
        self.clients
            .lock()
            .await
            .values()
            .filter(|e| e.last_activity_at < cutoff)
            .cloned()
            .collect()
    }

    /// Bump the request counter and touch activity
    pub async fn increment_request(&self, id: &ClientId) {
        self.increment(id, |m| m.request_count += 1).await;
    }

    /// Bump the error counter and touch activity
    pub async fn increment_error(&self, id: &ClientId) {
        self.increment(id, |m| m.error_count += 1).await;
    }

    async fn increment(&self, id: &ClientId, apply: impl FnOnce(&mut ClientMetrics)) {
        let mut clients = self.clients.lock().await;
        match clients.get_mut(id) {
            Some(entity) => {
                apply(&mut entity.metrics);
                let now = Utc::now();
                if now > entity.last_activity_at {
                    entity.last_activity_at = now;
                }
            }
            None => log::warn!("Counter increment for unknown client {id}; ignoring"),
        }
    }

    /// Apply a process-wide resource sample to every active entity
    ///
    /// Returns the updated metrics per client so the sampler can publish
    /// `ClientMetricsUpdated` events outside the store lock.
    pub async fn apply_gauges(
        &self,
        cpu_usage: f32,
        memory_bytes: u64,
    ) -> Vec<(ClientId, ClientMetrics)> {
        let mut clients = self.clients.lock().await;
        let mut updated = Vec::new();
        for entity in clients
            .values_mut()
            .filter(|e| e.status != ClientStatus::Disconnected)
        {
            entity.metrics.cpu_usage = Some(cpu_usage);
            entity.metrics.memory_bytes = Some(memory_bytes);
            updated.push((entity.id.clone(), entity.metrics.clone()));
        }
        updated
    }

    /// Attach a completed-task record to the client context
    pub async fn record_completion(&self, id: &ClientId, record: TaskRecord) {
        let mut clients = self.clients.lock().await;
        if let Some(entity) = clients.get_mut(id) {
            entity.context.current_task = None;
            entity.context.last_completed_task = Some(record);
        }
    }

    /// Snapshot of the bounded disconnect history, oldest first
    pub async fn history(&self) -> Vec<ClientEntity> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Count of live entities per status
    pub async fn status_counts(&self) -> HashMap<ClientStatus, usize> {
        let clients = self.clients.lock().await;
        let mut counts = HashMap::new();
        for entity in clients.values() {
            *counts.entry(entity.status).or_insert(0) += 1;
        }
        counts
    }

    pub(crate) fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}
