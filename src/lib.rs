//! # taskwatch
//!
//! Session registry and task-completion detection for concurrently connected
//! AI agent clients.
//!
//! Agents performing long-running, loosely-bounded tasks rarely report
//! completion reliably. taskwatch tracks each connected client's lifecycle and
//! infers completion from an idle timeout, file-activity heuristics, or
//! explicit signals, emitting exactly one completion event per detected
//! episode on an in-process event bus.
//!
//! ## Quick Start
//!
//! ```no_run
//! use taskwatch::{ClientKind, MonitorEvent, MonitorOptions, NewClient, SessionMonitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let monitor = SessionMonitor::new(MonitorOptions::default());
//!
//!     monitor.bus().subscribe("logger", |event: &MonitorEvent| {
//!         if let MonitorEvent::TaskCompleted(completion) = event {
//!             log::info!("{} finished: {}", completion.client_id, completion.trigger);
//!         }
//!         Ok(())
//!     });
//!
//!     let client = NewClient::new("agent-1", "Refactor worker", ClientKind::CodingAssistant)
//!         .working_dir("/work/repo")
//!         .current_task("refactor the parser");
//!     monitor.register_client(client).await?;
//!
//!     // ... protocol layer feeds activity via increment_request / apply_transition ...
//!
//!     monitor.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`types`]: core type definitions (entities, statuses, events)
//! - [`store`]: client entity store and status state machine
//! - [`detector`]: per-client completion detection engine
//! - [`watcher`]: file-activity adapter over the `notify` crate
//! - [`metrics`]: process-wide resource sampler
//! - [`bus`]: in-process publish/subscribe hub
//! - [`monitor`]: facade wiring everything together
//! - [`error`]: error types and handling
//!
//! ## Detection model
//!
//! One tracking session exists per client and emits at most one completion
//! event. Any activity while the session is armed resets the idle timer;
//! the first completion condition to fire (idle expiry, file-analysis match,
//! manual signal, process exit) closes the session. Re-detection for the same
//! client requires a new `start_tracking` call.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, MonitorError>`](Result). Errors
//! scoped to a single client (unknown ids, rejected transitions, watcher
//! failures) are contained to that client and logged; nothing in this crate is
//! fatal to the process.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bus;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod store;
pub mod types;
pub mod watcher;

// Re-export commonly used types for external API
pub use bus::EventBus;
pub use detector::{CompletionDetector, TrackingConfig};
pub use error::{MonitorError, Result};
pub use metrics::MetricsSampler;
pub use monitor::{MonitorOptions, MonitorOptionsBuilder, MonitorStats, SessionMonitor};
pub use store::{ClientStore, StatusChange};

// Re-export type submodules for flat public API
pub use types::client::{
    ClientCapabilities, ClientContext, ClientEntity, ClientKind, ClientMetrics, ClientStatus,
    NewClient, TaskRecord,
};
pub use types::events::{
    CompletionDetails, CompletionEvent, CompletionTrigger, FileChangeKind, MonitorEvent,
};
pub use types::identifiers::{ClientId, SubscriptionId};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
