//! Error types for the task-atlas core.
//!
//! Two layers, deliberately separate:
//! - [`CoreError`] — whole-operation failures surfaced to the caller
//!   (cache commit failed, cancellation, unknown task id).
//! - [`TaskErrorRecord`] — per-task failures collected into operation
//!   summaries. These never abort the enclosing scan or rebuild.

use serde::{Deserialize, Serialize};

/// Whole-operation error surfaced by the tool-call surface.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("task '{0}' not found")]
    TaskNotFound(String),

    #[error("skeleton cache is corrupt: {0}")]
    CacheCorrupt(String),

    #[error("unsupported skeleton cache schema version {found} (expected {expected})")]
    CacheVersionMismatch { found: u32, expected: u32 },

    #[error("skeleton cache commit failed: {0}")]
    CacheWriteFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("no storage roots available")]
    NoStorageRoots,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-task error category, mirrored into operation summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The task's file triple could not be read.
    SourceIo,
    /// Metadata or logs parse to neither accepted shape.
    SourceMalformed,
    /// At least one message carried malformed JSON in its `text` field.
    ExtractionPartial,
    /// A cached skeleton entry failed to deserialize and was dropped.
    CacheCorrupt,
    /// Phase 2 rejected a link that would have closed a cycle.
    CycleDetected,
    /// Per-task processing exceeded the soft deadline.
    Timeout,
    /// Per-task work was abandoned on cancellation.
    Cancelled,
}

/// One collected per-task error. Returned in summaries, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskErrorRecord {
    pub task_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskErrorRecord {
    pub fn new(task_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Maximum per-task errors carried verbatim in a client-visible summary.
/// The full count is always reported; the tail beyond this cap is dropped.
pub const ERROR_TAIL_CAP: usize = 25;

/// Cap an error list for client-visible summaries, preserving the total.
pub fn cap_error_tail(mut errors: Vec<TaskErrorRecord>) -> (Vec<TaskErrorRecord>, usize) {
    let total = errors.len();
    errors.truncate(ERROR_TAIL_CAP);
    (errors, total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tail_is_capped_but_total_preserved() {
        let errors: Vec<TaskErrorRecord> = (0..40)
            .map(|i| TaskErrorRecord::new(format!("task-{}", i), ErrorKind::SourceIo, "boom"))
            .collect();
        let (tail, total) = cap_error_tail(errors);
        assert_eq!(tail.len(), ERROR_TAIL_CAP);
        assert_eq!(total, 40);
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SourceMalformed).unwrap();
        assert_eq!(json, "\"source_malformed\"");
    }
}
