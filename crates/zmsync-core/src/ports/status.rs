//! Status reporting port (driven/secondary port)
//!
//! The sync orchestrator emits one concise status line per phase
//! transition ("Found 3 event directories.", "Uploading 2 files,
//! skipping 1.", "Done!"). Where those lines go is up to the adapter: the
//! CLI prints them, tests collect them.
//!
//! ## Design Notes
//!
//! - Reporting is synchronous and infallible; a reporter that cannot
//!   deliver a line drops it.
//! - Status lines are user-facing and complement, not replace, the
//!   structured `tracing` logs.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Kind of a status line, used by adapters to pick a presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Progress through the run
    Progress,
    /// The run finished successfully
    Success,
    /// Something was dropped but the run continues
    Warning,
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatusKind::Progress => "progress",
            StatusKind::Success => "success",
            StatusKind::Warning => "warning",
        };
        write!(f, "{}", s)
    }
}

/// Port trait for user-facing status lines
pub trait IStatusReporter: Send + Sync {
    /// Reports a single status line
    fn report(&self, kind: StatusKind, message: &str);
}

/// Reporter that discards every line
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStatusReporter;

impl IStatusReporter for NullStatusReporter {
    fn report(&self, _kind: StatusKind, _message: &str) {}
}

/// Reporter that keeps every line in memory
///
/// Useful for tests and for rendering a run summary after the fact.
#[derive(Debug, Default)]
pub struct CollectingStatusReporter {
    lines: Mutex<Vec<(StatusKind, String)>>,
}

impl CollectingStatusReporter {
    /// Creates an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all lines reported so far, in order
    pub fn lines(&self) -> Vec<(StatusKind, String)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Returns only the message texts, in order
    pub fn messages(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, message)| message).collect()
    }
}

impl IStatusReporter for CollectingStatusReporter {
    fn report(&self, kind: StatusKind, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((kind, message.to_string()));
        }
    }
}
