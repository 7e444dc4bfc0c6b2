//! Client entity types
//!
//! Defines the canonical state held for each connected agent session: identity,
//! status, free-form working context, and resource metrics.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MonitorError, Result};
use crate::types::events::CompletionTrigger;
use crate::types::identifiers::ClientId;

// ============================================================================
// Client kind and capabilities
// ============================================================================

/// Kind of connected agent client
///
/// Informs which capabilities apply to a client; never gates core detection
/// logic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    /// Interactive coding assistant working inside a repository
    CodingAssistant,
    /// General-purpose CLI agent
    GeneralCliAgent,
    /// Generic agent with no special integration
    GenericAgent,
    /// Custom client kind identified by a caller-supplied label
    Custom(String),
}

bitflags! {
    /// Capability set associated with a client kind
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClientCapabilities: u8 {
        /// Client works against a file tree worth watching
        const FILE_TRACKING = 1 << 0;
        /// Process-level resource gauges are meaningful for this client
        const PROCESS_METRICS = 1 << 1;
        /// Task-completion detection applies
        const TASK_DETECTION = 1 << 2;
        /// Client accepts follow-up input mid-task
        const INTERACTIVE = 1 << 3;
    }
}

impl ClientKind {
    /// Capability lookup for this kind
    ///
    /// Closed table; custom kinds get the generic capability set rather than
    /// any string-based dispatch.
    #[must_use]
    pub fn capabilities(&self) -> ClientCapabilities {
        match self {
            Self::CodingAssistant => {
                ClientCapabilities::FILE_TRACKING
                    | ClientCapabilities::PROCESS_METRICS
                    | ClientCapabilities::TASK_DETECTION
                    | ClientCapabilities::INTERACTIVE
            }
            Self::GeneralCliAgent => {
                ClientCapabilities::PROCESS_METRICS
                    | ClientCapabilities::TASK_DETECTION
                    | ClientCapabilities::INTERACTIVE
            }
            Self::GenericAgent | Self::Custom(_) => ClientCapabilities::TASK_DETECTION,
        }
    }

    /// Whether the kind itself is well-formed (a `Custom` label must be non-empty)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Custom(label) => !label.trim().is_empty(),
            _ => true,
        }
    }
}

impl std::fmt::Display for ClientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CodingAssistant => f.write_str("coding_assistant"),
            Self::GeneralCliAgent => f.write_str("general_cli_agent"),
            Self::GenericAgent => f.write_str("generic_agent"),
            Self::Custom(label) => write!(f, "custom({label})"),
        }
    }
}

// ============================================================================
// Client status
// ============================================================================

/// Live status of a connected client
///
/// Transitions between statuses go through the state machine in
/// [`crate::store`]; `Disconnected` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    /// Registered and connected, no task observed yet
    Connected,
    /// Connected but not actively working
    Idle,
    /// Actively working on a task
    Running,
    /// Blocked waiting for user input
    WaitingInput,
    /// Paused by the client or an operator
    Paused,
    /// Last operation failed; client is still connected
    Error,
    /// A task-completion episode fired for this client
    Completed,
    /// Terminal: client is gone
    Disconnected,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Idle => "idle",
            Self::Running => "running",
            Self::WaitingInput => "waiting_input",
            Self::Paused => "paused",
            Self::Error => "error",
            Self::Completed => "completed",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Context and metrics
// ============================================================================

/// Record of the most recently completed task for a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task description at completion time, if one was known
    pub description: Option<String>,
    /// What triggered the completion
    pub trigger: CompletionTrigger,
    /// When the completion episode fired
    pub completed_at: DateTime<Utc>,
}

/// Free-form working context reported by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
    /// Working directory the client operates in
    pub working_dir: Option<PathBuf>,
    /// Files the client currently has open or is editing
    #[serde(default)]
    pub active_files: Vec<PathBuf>,
    /// Description of the task currently being worked on
    pub current_task: Option<String>,
    /// Most recently completed task, set by the completion detector
    pub last_completed_task: Option<TaskRecord>,
}

/// Counters and gauges tracked per client
///
/// Counters are incremented by protocol-boundary code; gauges are written by
/// the process-wide metrics sampler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMetrics {
    /// Requests observed for this client
    pub request_count: u64,
    /// Errors observed for this client
    pub error_count: u64,
    /// Latest process CPU usage sample, percent
    pub cpu_usage: Option<f32>,
    /// Latest process memory sample, bytes
    pub memory_bytes: Option<u64>,
}

// ============================================================================
// Client entity
// ============================================================================

/// Identity and live state of one connected agent session
///
/// Entities are exclusively owned by the [`crate::store::ClientStore`]; values
/// handed out by accessors are snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEntity {
    /// Opaque unique id, immutable after registration
    pub id: ClientId,
    /// Human-readable display name
    pub name: String,
    /// Kind of client
    pub kind: ClientKind,
    /// Current status; mutated only through the state machine
    pub status: ClientStatus,
    /// When the client registered
    pub connected_at: DateTime<Utc>,
    /// Last observed interaction; monotonically non-decreasing
    pub last_activity_at: DateTime<Utc>,
    /// Free-form working context
    #[serde(default)]
    pub context: ClientContext,
    /// Counters and gauges
    #[serde(default)]
    pub metrics: ClientMetrics,
}

impl ClientEntity {
    /// Time the client has been connected
    #[must_use]
    pub fn uptime(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.connected_at)
    }
}

/// Registration request for a new client
///
/// Validated by [`crate::store::ClientStore::register`]; an invalid request is
/// rejected without mutating anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClient {
    /// Unique id for the client
    pub id: ClientId,
    /// Display name
    pub name: String,
    /// Client kind
    pub kind: ClientKind,
    /// Initial working context
    #[serde(default)]
    pub context: ClientContext,
}

impl NewClient {
    /// Create a registration request with an empty context
    pub fn new(id: impl Into<ClientId>, name: impl Into<String>, kind: ClientKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            context: ClientContext::default(),
        }
    }

    /// Set the working directory in the initial context
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context.working_dir = Some(dir.into());
        self
    }

    /// Set the current task description in the initial context
    #[must_use]
    pub fn current_task(mut self, task: impl Into<String>) -> Self {
        self.context.current_task = Some(task.into());
        self
    }

    /// Validate id, display name, and kind
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(MonitorError::invalid_entity("client id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(MonitorError::invalid_entity(format!(
                "client {} has an empty display name",
                self.id
            )));
        }
        if !self.kind.is_valid() {
            return Err(MonitorError::invalid_entity(format!(
                "client {} has an empty custom kind label",
                self.id
            )));
        }
        Ok(())
    }

    pub(crate) fn into_entity(self, now: DateTime<Utc>) -> ClientEntity {
        ClientEntity {
            id: self.id,
            name: self.name,
            kind: self.kind,
            status: ClientStatus::Connected,
            connected_at: now,
            last_activity_at: now,
            context: self.context,
            metrics: ClientMetrics::default(),
        }
    }
}
