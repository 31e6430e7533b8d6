//! Session infrastructure types.
//!
//! Defines metadata, the operation log and export records.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Metadata about a refinement session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Problem type identifier (from `ProblemType::name()`).
    pub problem_type: String,

    /// Schema version (from `ProblemType::schema_version()`).
    pub schema_version: u32,

    /// Unix timestamp when the session was created (seconds since epoch).
    pub created_at: u64,

    /// Unix timestamp of the last mutation (seconds since epoch).
    pub last_modified: u64,

    /// Optional user-provided description (project, block, flight).
    pub description: Option<String>,
}

impl SessionMetadata {
    pub fn new(problem_type: impl Into<String>, schema_version: u32) -> Self {
        let now = current_timestamp();
        Self {
            problem_type: problem_type.into(),
            schema_version,
            created_at: now,
            last_modified: now,
            description: None,
        }
    }

    pub fn with_description(
        problem_type: impl Into<String>,
        schema_version: u32,
        description: impl Into<String>,
    ) -> Self {
        let mut meta = Self::new(problem_type, schema_version);
        meta.description = Some(description.into());
        meta
    }

    /// Update `last_modified` to now.
    pub fn touch(&mut self) {
        self.last_modified = current_timestamp();
    }
}

/// How an operation ended.
///
/// A halt is an ordinary termination with a reason, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogOutcome {
    Success,
    Halted,
    Failure,
}

/// Lightweight operation log entry.
///
/// Audit trail of the steps run on a session. Not intended for replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,

    /// Operation name (e.g. "prepare", "stage_re", "tighten").
    pub operation: String,

    pub outcome: LogOutcome,

    /// Optional notes, halt reason or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    fn with_outcome(
        operation: impl Into<String>,
        outcome: LogOutcome,
        notes: Option<String>,
    ) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            outcome,
            notes,
        }
    }

    pub fn success(operation: impl Into<String>) -> Self {
        Self::with_outcome(operation, LogOutcome::Success, None)
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self::with_outcome(operation, LogOutcome::Success, Some(notes.into()))
    }

    pub fn halted(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_outcome(operation, LogOutcome::Halted, Some(reason.into()))
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::with_outcome(operation, LogOutcome::Failure, Some(error.into()))
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == LogOutcome::Failure
    }
}

/// Record of an exported result.
///
/// Each call to [`RefinementSession::export`](super::RefinementSession::export)
/// stores one record in the session's exports collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord<E> {
    /// Unix timestamp when the export was created (seconds since epoch).
    pub timestamp: u64,

    pub export: E,

    pub notes: Option<String>,
}

impl<E> ExportRecord<E> {
    pub fn new(export: E) -> Self {
        Self {
            timestamp: current_timestamp(),
            export,
            notes: None,
        }
    }

    pub fn with_notes(export: E, notes: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            export,
            notes: Some(notes.into()),
        }
    }
}

/// Current Unix timestamp in seconds. A clock before the epoch reads as 0.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
