//! Skeleton assembly for one task.
//!
//! A skeleton is a pure function of its source bytes: same
//! `(metadata, ui_log, api_log)` bytes produce the same skeleton. Resolution
//! fields start at their defaults; the hierarchy engine fills them in after
//! every refresh.

use crate::error::{ErrorKind, TaskErrorRecord};
use crate::extract::{extract_instructions, normalize_prefix, truncate_instruction};
use crate::messages::{parse_ui_log, UiMessage};
use crate::skeleton::types::{RawTaskMetadata, SourceChecksums, TaskSkeleton};
use crate::storage::{checksum, TaskTriple};

/// Outcome of building one skeleton: the skeleton plus any non-fatal
/// extraction warnings.
#[derive(Debug)]
pub struct BuildOutcome {
    pub skeleton: TaskSkeleton,
    pub warnings: Vec<TaskErrorRecord>,
}

/// Assemble a skeleton from one task's source triple.
///
/// Fails only when the metadata record itself is missing or unparseable;
/// everything else degrades to warnings.
pub fn build_skeleton(
    task_id: &str,
    triple: &TaskTriple,
    prefix_length: usize,
) -> Result<BuildOutcome, TaskErrorRecord> {
    let metadata_bytes = triple.metadata.as_deref().ok_or_else(|| {
        TaskErrorRecord::new(task_id, ErrorKind::SourceIo, "task_metadata.json missing")
    })?;
    let metadata: RawTaskMetadata = serde_json::from_slice(metadata_bytes).map_err(|e| {
        TaskErrorRecord::new(
            task_id,
            ErrorKind::SourceMalformed,
            format!("task_metadata.json: {}", e),
        )
    })?;

    let mut warnings = Vec::new();

    // Parse the UI log; an unreadable log contributes zero instructions and
    // a warning, never a failure.
    let ui_len = triple.ui_log.as_deref().map(|b| b.len()).unwrap_or(0);
    let ui_parse = triple
        .ui_log
        .as_deref()
        .map(parse_ui_log)
        .unwrap_or_default();
    if ui_parse.is_malformed(ui_len) {
        warnings.push(TaskErrorRecord::new(
            task_id,
            ErrorKind::SourceMalformed,
            "ui_messages.json parses to neither accepted shape",
        ));
    } else if ui_parse.dropped_lines > 0 {
        warnings.push(TaskErrorRecord::new(
            task_id,
            ErrorKind::ExtractionPartial,
            format!("{} malformed UI log lines dropped", ui_parse.dropped_lines),
        ));
    }
    let messages = ui_parse.messages.as_slice();

    let (instructions, extraction_log) = extract_instructions(messages);
    if !extraction_log.is_clean() {
        warnings.push(TaskErrorRecord::new(
            task_id,
            ErrorKind::ExtractionPartial,
            format!(
                "{} messages with malformed embedded JSON",
                extraction_log.malformed_payloads
            ),
        ));
    }

    let mut child_prefixes: Vec<String> = instructions
        .iter()
        .map(|i| normalize_prefix(&i.message, prefix_length))
        .filter(|p| !p.is_empty())
        .collect();
    child_prefixes.sort();
    child_prefixes.dedup();

    // The task's own initial instruction: metadata first, else the initial
    // "task" UI message.
    let instruction_source = metadata
        .instruction
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| first_task_message(messages));

    let message_count = messages.len();
    let action_count = messages
        .iter()
        .filter(|m| UiMessage::from(*m).is_action())
        .count();

    let skeleton = TaskSkeleton {
        task_id: task_id.to_string(),
        workspace: metadata.workspace.unwrap_or_default(),
        created_at: metadata.created_at,
        last_activity: metadata.last_activity,
        title: metadata.title,
        truncated_instruction: instruction_source
            .as_deref()
            .map(truncate_instruction)
            .unwrap_or_default(),
        child_task_instruction_prefixes: child_prefixes,
        parent_task_id: metadata.parent_task_id,
        reconstructed_parent_id: None,
        parent_resolution_method: Default::default(),
        is_root_task: false,
        source_checksums: triple_checksums(triple),
        message_count,
        action_count,
        total_size: triple.total_size(),
    };

    Ok(BuildOutcome { skeleton, warnings })
}

/// Checksums over the raw bytes of each source file.
pub fn triple_checksums(triple: &TaskTriple) -> SourceChecksums {
    SourceChecksums {
        ui_log: checksum(triple.ui_log.as_deref()),
        api_log: checksum(triple.api_log.as_deref()),
        metadata: checksum(triple.metadata.as_deref()),
    }
}

/// The text of the first `say = "task"` message, the host's record of the
/// initial user request.
fn first_task_message(messages: &[crate::messages::RawUiMessage]) -> Option<String> {
    messages
        .iter()
        .find(|m| m.say.as_deref() == Some("task"))
        .and_then(|m| m.text.clone())
        .filter(|t| !t.trim().is_empty())
}
