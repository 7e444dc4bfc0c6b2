//! Lifecycle and completion event types
//!
//! Every event published on the [`crate::bus::EventBus`] serializes to a stable
//! JSON shape: a `type` tag, the client id where applicable, a timestamp, and a
//! trigger-specific payload. Downstream notification collaborators consume
//! these verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::client::{ClientKind, ClientMetrics, ClientStatus};
use crate::types::identifiers::ClientId;

/// Normalized kind of a file-system change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    /// A file or directory was created
    Added,
    /// Contents or metadata changed
    Changed,
    /// A file or directory was removed
    Removed,
}

/// What fired a completion episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionTrigger {
    /// Idle timer expired with no intervening activity
    IdleTimeout,
    /// A changed file matched a completion pattern and contained a keyword
    FileAnalysis,
    /// Explicit completion signal from the client or an operator
    Manual,
    /// The client process exited
    ProcessCompletion,
}

impl std::fmt::Display for CompletionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::IdleTimeout => "idle_timeout",
            Self::FileAnalysis => "file_analysis",
            Self::Manual => "manual",
            Self::ProcessCompletion => "process_completion",
        };
        f.write_str(s)
    }
}

/// Trigger-specific payload of a completion event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionDetails {
    /// Payload for [`CompletionTrigger::IdleTimeout`]
    Idle {
        /// Configured idle timeout that expired, in milliseconds
        idle_ms: u64,
    },
    /// Payload for [`CompletionTrigger::FileAnalysis`]
    FileMatch {
        /// File whose content signalled completion
        file: PathBuf,
        /// Every configured keyword found in the file, lowercase
        matched_keywords: Vec<String>,
    },
    /// Payload for [`CompletionTrigger::Manual`]
    Manual {
        /// Caller-supplied reason, if any
        reason: Option<String>,
    },
    /// Payload for [`CompletionTrigger::ProcessCompletion`]
    ProcessExit {
        /// Exit code reported for the client process
        exit_code: i32,
    },
}

/// Immutable record of one detected completion episode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Client the episode belongs to
    pub client_id: ClientId,
    /// What fired the episode
    pub trigger: CompletionTrigger,
    /// Trigger-specific payload
    pub details: CompletionDetails,
    /// When the episode fired
    pub timestamp: DateTime<Utc>,
}

/// Events published on the bus
///
/// Serialized with an internal `type` tag so consumers can route on a single
/// field without knowing the full variant set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A client registered
    ClientConnected {
        /// Id of the new client
        client_id: ClientId,
        /// Display name
        name: String,
        /// Kind of client
        kind: ClientKind,
        /// When the registration was applied
        timestamp: DateTime<Utc>,
    },
    /// A client was unregistered or swept as inactive
    ClientDisconnected {
        /// Id of the removed client
        client_id: ClientId,
        /// When the removal was applied
        timestamp: DateTime<Utc>,
    },
    /// A status transition was accepted by the state machine
    ClientStatusChanged {
        /// Client that changed status
        client_id: ClientId,
        /// Status before the transition
        from: ClientStatus,
        /// Status after the transition
        to: ClientStatus,
        /// When the transition was applied
        timestamp: DateTime<Utc>,
    },
    /// The metrics sampler applied a fresh resource sample to a client
    ClientMetricsUpdated {
        /// Client the sample was applied to
        client_id: ClientId,
        /// Metrics after the update
        metrics: ClientMetrics,
        /// When the sample was taken
        timestamp: DateTime<Utc>,
    },
    /// The watcher observed a file-system change scoped to a client
    FileChanged {
        /// Client whose watch paths the change falls under
        client_id: ClientId,
        /// Path that changed
        path: PathBuf,
        /// Normalized change kind
        change: FileChangeKind,
        /// When the change was observed
        timestamp: DateTime<Utc>,
    },
    /// A completion episode fired; at most one per tracking session
    TaskCompleted(CompletionEvent),
}

impl MonitorEvent {
    /// Client the event concerns
    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::ClientConnected { client_id, .. }
            | Self::ClientDisconnected { client_id, .. }
            | Self::ClientStatusChanged { client_id, .. }
            | Self::ClientMetricsUpdated { client_id, .. }
            | Self::FileChanged { client_id, .. } => client_id,
            Self::TaskCompleted(event) => &event.client_id,
        }
    }

    /// When the event was generated
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::ClientConnected { timestamp, .. }
            | Self::ClientDisconnected { timestamp, .. }
            | Self::ClientStatusChanged { timestamp, .. }
            | Self::ClientMetricsUpdated { timestamp, .. }
            | Self::FileChanged { timestamp, .. } => *timestamp,
            Self::TaskCompleted(event) => event.timestamp,
        }
    }
}
