//! Error types for the session monitor

use thiserror::Error;

/// Main error type for session monitoring operations
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Malformed client registration; nothing was mutated
    #[error("Invalid client entity: {0}")]
    InvalidEntity(String),

    /// Operation referenced an unknown client id
    #[error("Client not found: {0}")]
    NotFound(String),

    /// Status change rejected by the transition table
    #[error("Invalid status transition for {client}: {from} -> {to}")]
    InvalidTransition {
        /// Client the transition was attempted on
        client: String,
        /// Status the client currently holds
        from: String,
        /// Status that was requested
        to: String,
    },

    /// File-system watcher adapter error; tracking continues without
    /// file-based detection for the affected client
    #[error("File watcher failure: {0}")]
    WatcherFailure(String),

    /// Metrics tick error; the sample is skipped
    #[error("Metrics sampling failure: {0}")]
    SamplingFailure(String),

    /// Event consumer raised; isolated from other subscribers
    #[error("Event subscriber '{subscriber}' failed: {message}")]
    SubscriberFailure {
        /// Name the subscriber registered under
        subscriber: String,
        /// Error message reported by the subscriber
        message: String,
    },

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session monitoring operations
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Create an invalid entity error
    pub fn invalid_entity(msg: impl Into<String>) -> Self {
        Self::InvalidEntity(msg.into())
    }

    /// Create a not found error
    pub fn not_found(client_id: impl Into<String>) -> Self {
        Self::NotFound(client_id.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        client: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            client: client.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a watcher failure error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::WatcherFailure(msg.into())
    }

    /// Create a sampling failure error
    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::SamplingFailure(msg.into())
    }

    /// Create a subscriber failure error
    pub fn subscriber(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SubscriberFailure {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }
}
