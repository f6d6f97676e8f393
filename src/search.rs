//! Contract with the external vector-search collaborator.
//!
//! The core only produces chunk records and consumes search hits; embedding
//! generation and vector storage live behind this trait. Collection naming
//! is content-addressed from the workspace path so the same workspace,
//! regardless of case and separator style, resolves to one collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunking::TaskChunk;
use crate::error::CoreError;

/// One hit returned by the search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub chunk_id: String,
    pub task_id: String,
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Optional filters on a search query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub workspace: Option<String>,
    pub task_id: Option<String>,
}

/// The outbound contract the dispatch layer implements against its
/// vector-database client.
#[async_trait]
pub trait SearchIndexClient: Send + Sync {
    /// Bulk-upsert chunks into a collection.
    async fn upsert_chunks(&self, collection: &str, chunks: &[TaskChunk])
        -> Result<(), CoreError>;

    /// Query a collection.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>, CoreError>;
}

/// Content-addressed collection name for a workspace path.
///
/// Case is folded and separators unified before hashing, so
/// `C:\Dev\Project`, `c:/dev/project` and `c:/dev/project/` name the same
/// collection.
pub fn collection_name_for_workspace(workspace: &str) -> String {
    let canonical = workspace
        .trim()
        .to_lowercase()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("ws_{}", &digest[..16])
}
