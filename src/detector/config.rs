//! Tracking configuration
//!
//! Per-client configuration for one completion-detection episode. Defaults are
//! tuned per client kind via the capability table; callers override anything
//! they know better.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::{ClientCapabilities, ClientKind};
use crate::watcher::DEFAULT_IGNORE_PATTERNS;

/// Configuration for one tracking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Inactivity span after which the task is presumed finished
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: Duration,
    /// Keywords whose presence in a matched file signals completion
    /// (case-insensitive substring, OR semantics)
    #[serde(default = "default_keywords")]
    pub completion_keywords: Vec<String>,
    /// File-name patterns worth inspecting on change (`*` wildcards)
    #[serde(default = "default_file_patterns")]
    pub completion_file_patterns: Vec<String>,
    /// Whether to subscribe to file-system changes at all
    #[serde(default = "default_monitor_file_changes")]
    pub monitor_file_changes: bool,
    /// Paths to watch; defaults to the client's working directory when empty
    #[serde(default)]
    pub watch_paths: Vec<PathBuf>,
    /// Path fragments excluded from change reporting
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(45)
}

fn default_keywords() -> Vec<String> {
    ["completed", "finished", "done", "success", "build successful"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_file_patterns() -> Vec<String> {
    ["*.log", "package.json", "Cargo.toml", "README*", "*test*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_monitor_file_changes() -> bool {
    true
}

fn default_ignore_patterns() -> Vec<String> {
    DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            completion_keywords: default_keywords(),
            completion_file_patterns: default_file_patterns(),
            monitor_file_changes: default_monitor_file_changes(),
            watch_paths: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
        }
    }
}

impl TrackingConfig {
    /// Capability-informed defaults for a client kind
    ///
    /// Coding assistants produce bursts of edits, so they get the shortest
    /// idle window; kinds without file tracking skip the watcher entirely.
    #[must_use]
    pub fn for_kind(kind: &ClientKind) -> Self {
        let idle_timeout = match kind {
            ClientKind::CodingAssistant => Duration::from_secs(30),
            ClientKind::GeneralCliAgent => Duration::from_secs(45),
            ClientKind::GenericAgent | ClientKind::Custom(_) => Duration::from_secs(60),
        };
        Self {
            idle_timeout,
            monitor_file_changes: kind.capabilities().contains(ClientCapabilities::FILE_TRACKING),
            ..Self::default()
        }
    }

    /// Override the idle timeout
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enable or disable file-change monitoring
    #[must_use]
    pub fn monitor_file_changes(mut self, enabled: bool) -> Self {
        self.monitor_file_changes = enabled;
        self
    }

    /// Add a path to watch
    #[must_use]
    pub fn watch_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.watch_paths.push(path.into());
        self
    }

    /// Replace the completion keyword set
    #[must_use]
    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completion_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the completion file-pattern set
    #[must_use]
    pub fn file_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completion_file_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}
