//! Slice a task's message sequence into bounded, semantically coherent
//! chunks for the external search index.
//!
//! Chunk boundaries follow message boundaries: a message is never split
//! across chunks, even when it alone exceeds the byte budget (its content is
//! bounded instead). Output is deterministic for the same input.

use serde::{Deserialize, Serialize};

use crate::extract::truncate_utf8;
use crate::messages::{RawUiMessage, UiMessage};
use crate::skeleton::TaskSkeleton;

/// What a chunk carries semantically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// A batch of conversational messages.
    MessageExchange,
    /// One tool invocation payload.
    ToolInvocation,
    /// The task's metadata header (title, instruction, workspace).
    Summary,
}

/// One chunk handed to the search-index collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChunk {
    pub task_id: String,
    pub chunk_index: usize,
    pub chunk_type: ChunkType,
    pub content: String,
    pub workspace: String,
    pub task_title: Option<String>,
    pub host_identifier: String,
}

/// Deterministic chunker over one task's UI messages.
#[derive(Debug, Clone)]
pub struct TaskChunker {
    max_bytes: usize,
    host_identifier: String,
}

impl TaskChunker {
    pub fn new(max_bytes: usize, host_identifier: impl Into<String>) -> Self {
        Self {
            max_bytes: max_bytes.max(64),
            host_identifier: host_identifier.into(),
        }
    }

    /// Chunk one task: a summary chunk first, then message-exchange and
    /// tool-invocation chunks in log order.
    pub fn chunk_task(&self, skeleton: &TaskSkeleton, messages: &[RawUiMessage]) -> Vec<TaskChunk> {
        let mut chunks = Vec::new();

        let summary = self.summary_content(skeleton);
        if !summary.is_empty() {
            chunks.push(self.make_chunk(skeleton, chunks.len(), ChunkType::Summary, summary));
        }

        // Batch consecutive conversational texts up to the byte budget;
        // flush on every tool invocation so tool payloads stay standalone.
        let mut batch: Vec<String> = Vec::new();
        let mut batch_bytes = 0usize;

        for raw in messages {
            match UiMessage::from(raw) {
                UiMessage::ToolAsk { text, .. } => {
                    self.flush_batch(skeleton, &mut chunks, &mut batch, &mut batch_bytes);
                    let content = self.bound(&text);
                    chunks.push(self.make_chunk(
                        skeleton,
                        chunks.len(),
                        ChunkType::ToolInvocation,
                        content,
                    ));
                }
                UiMessage::ApiReqStarted { .. } => {
                    // Request bookkeeping; nothing a search hit should surface.
                }
                UiMessage::Other { text: Some(text), .. } => {
                    let text = text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let bounded = self.bound(text);
                    if batch_bytes + bounded.len() > self.max_bytes && !batch.is_empty() {
                        self.flush_batch(skeleton, &mut chunks, &mut batch, &mut batch_bytes);
                    }
                    batch_bytes += bounded.len();
                    batch.push(bounded);
                }
                UiMessage::Other { text: None, .. } => {}
            }
        }
        self.flush_batch(skeleton, &mut chunks, &mut batch, &mut batch_bytes);

        chunks
    }

    fn summary_content(&self, skeleton: &TaskSkeleton) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &skeleton.title {
            if !title.trim().is_empty() {
                parts.push(title.trim().to_string());
            }
        }
        if !skeleton.truncated_instruction.is_empty() {
            parts.push(skeleton.truncated_instruction.clone());
        }
        if !skeleton.workspace.is_empty() {
            parts.push(format!("workspace: {}", skeleton.workspace));
        }
        self.bound(&parts.join("\n"))
    }

    fn flush_batch(
        &self,
        skeleton: &TaskSkeleton,
        chunks: &mut Vec<TaskChunk>,
        batch: &mut Vec<String>,
        batch_bytes: &mut usize,
    ) {
        if batch.is_empty() {
            return;
        }
        let content = batch.join("\n\n");
        chunks.push(self.make_chunk(skeleton, chunks.len(), ChunkType::MessageExchange, content));
        batch.clear();
        *batch_bytes = 0;
    }

    fn make_chunk(
        &self,
        skeleton: &TaskSkeleton,
        index: usize,
        chunk_type: ChunkType,
        content: String,
    ) -> TaskChunk {
        TaskChunk {
            task_id: skeleton.task_id.clone(),
            chunk_index: index,
            chunk_type,
            content,
            workspace: skeleton.workspace.clone(),
            task_title: skeleton.title.clone(),
            host_identifier: self.host_identifier.clone(),
        }
    }

    /// Bound a single message's content to the budget at a char boundary.
    fn bound(&self, text: &str) -> String {
        if text.len() <= self.max_bytes {
            return text.to_string();
        }
        // Budget in chars is conservative for multi-byte text; the point is
        // an upper bound, not exact packing.
        truncate_utf8(text, self.max_bytes / 4)
    }
}
