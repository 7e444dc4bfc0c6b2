//! Process-level metrics sampling
//!
//! Runs on a fixed period per process, not per client: one sysinfo refresh per
//! tick, with the resulting CPU/memory gauges applied to every active entity.
//! A failed sample is logged and skipped; the interval never stops.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::store::ClientStore;
use crate::types::MonitorEvent;

/// Default sampling period
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(5);

/// One process-wide resource sample
#[derive(Debug, Clone)]
pub struct ResourceSample {
    /// Process CPU usage, percent
    pub cpu_usage: f32,
    /// Process resident memory, bytes
    pub memory_bytes: u64,
    /// When the sample was taken
    pub sampled_at: DateTime<Utc>,
}

/// Periodic sampler applying process gauges to all active clients
pub struct MetricsSampler {
    store: Arc<ClientStore>,
    bus: Arc<EventBus>,
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MetricsSampler {
    /// Create a sampler; call [`MetricsSampler::start`] to begin ticking
    #[must_use]
    pub fn new(store: Arc<ClientStore>, bus: Arc<EventBus>, period: Duration) -> Self {
        Self {
            store,
            bus,
            period,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the sampling loop
    ///
    /// Idempotent: a second call while the loop is running is a no-op.
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);
        let period = self.period;

        *handle = Some(tokio::spawn(async move {
            // Persistent System so successive refreshes yield CPU deltas.
            let mut sys = System::new();
            let pid = Pid::from(std::process::id() as usize);
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                match sample_process(&mut sys, pid) {
                    Some(sample) => {
                        let updated = store
                            .apply_gauges(sample.cpu_usage, sample.memory_bytes)
                            .await;
                        for (client_id, metrics) in updated {
                            bus.publish(&MonitorEvent::ClientMetricsUpdated {
                                client_id,
                                metrics,
                                timestamp: sample.sampled_at,
                            });
                        }
                    }
                    None => {
                        log::warn!("Metrics sample failed for pid {pid}; skipping tick");
                    }
                }
            }
        }));
    }

    /// Stop the sampling loop
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for MetricsSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Refresh and read gauges for one process
///
/// Returns `None` when the process cannot be found or refreshed, which the
/// caller treats as a skipped tick.
fn sample_process(sys: &mut System, pid: Pid) -> Option<ResourceSample> {
    if !sys.refresh_process(pid) {
        return None;
    }
    sys.process(pid).map(|process| ResourceSample {
        cpu_usage: process.cpu_usage(),
        memory_bytes: process.memory(),
        sampled_at: Utc::now(),
    })
}
