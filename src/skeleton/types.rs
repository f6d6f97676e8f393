//! Types for the skeleton cache.

use serde::{Deserialize, Serialize};

use crate::storage::ABSENT_CHECKSUM;

/// How a task's parent link was (or wasn't) established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParentResolutionMethod {
    /// The task's own instruction matched a conversational root pattern.
    RootDetected,
    /// Exact normalized-prefix match in the instruction index.
    RadixTreeExact,
    /// Not resolved (or host-provided link trusted as-is).
    #[default]
    None,
}

/// Checksums of the three source files, used for incremental refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceChecksums {
    pub ui_log: String,
    pub api_log: String,
    pub metadata: String,
}

impl Default for SourceChecksums {
    fn default() -> Self {
        Self {
            ui_log: ABSENT_CHECKSUM.to_string(),
            api_log: ABSENT_CHECKSUM.to_string(),
            metadata: ABSENT_CHECKSUM.to_string(),
        }
    }
}

/// The cached unit: everything the hierarchy engine and the read queries
/// need about one task, without re-reading its logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSkeleton {
    /// Task ID (directory name, UUID-shaped)
    pub task_id: String,
    /// Absolute workspace path recorded by the host; may be empty
    pub workspace: String,
    /// ISO 8601 creation timestamp, if the host recorded one
    pub created_at: Option<String>,
    /// ISO 8601 last-activity timestamp, if the host recorded one
    pub last_activity: Option<String>,
    /// Free-form task title from the host metadata
    pub title: Option<String>,
    /// This task's own initial instruction, whitespace-collapsed and bounded
    pub truncated_instruction: String,
    /// Normalized prefixes of every child invocation THIS task declared
    pub child_task_instruction_prefixes: Vec<String>,
    /// Host-provided parent link, if any
    pub parent_task_id: Option<String>,
    /// Parent link reconstructed by the hierarchy engine
    pub reconstructed_parent_id: Option<String>,
    pub parent_resolution_method: ParentResolutionMethod,
    pub is_root_task: bool,
    pub source_checksums: SourceChecksums,
    /// Number of UI messages in the log
    pub message_count: usize,
    /// Number of tool-ask messages (agent actions)
    pub action_count: usize,
    /// Total byte size of the source triple
    pub total_size: u64,
}

impl TaskSkeleton {
    /// The parent link the forest uses: the engine's reconstruction wins,
    /// else the host-provided link.
    pub fn effective_parent(&self) -> Option<&str> {
        self.reconstructed_parent_id
            .as_deref()
            .or(self.parent_task_id.as_deref())
    }

    pub fn created_at_ms(&self) -> Option<i64> {
        parse_ts_ms(self.created_at.as_deref())
    }

    pub fn last_activity_ms(&self) -> Option<i64> {
        parse_ts_ms(self.last_activity.as_deref())
    }
}

/// `task_metadata.json` structure (only the fields the core reads).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTaskMetadata {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// The initial user request.
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
    /// Host-provided parent link; unreliable, often absent.
    #[serde(default)]
    pub parent_task_id: Option<String>,
}

/// Parse an ISO 8601 timestamp to epoch milliseconds.
pub fn parse_ts_ms(ts: Option<&str>) -> Option<i64> {
    let ts = ts?;
    chrono::DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
