//! The tool-call surface consumed by the dispatch layer.
//!
//! `StateService` owns the skeleton cache and the resolved in-memory state.
//! Writes (rebuilds) go through a single owner; readers take cheap snapshot
//! handles. The dispatch layer maps these operations one-to-one onto its
//! tool registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::chunking::{TaskChunk, TaskChunker};
use crate::config::AtlasConfig;
use crate::error::{CoreError, TaskErrorRecord};
use crate::hierarchy::{build_instruction_index, resolve_hierarchy, Phase2Report, TaskForest};
use crate::messages::parse_ui_log;
use crate::skeleton::{build_or_refresh, CancellationFlag, SkeletonCache, TaskSkeleton};
use crate::storage::StorageDetector;

/// Immutable resolved state: the skeleton map plus the materialized forest.
#[derive(Debug, Default)]
pub struct ResolvedState {
    pub skeletons: HashMap<String, TaskSkeleton>,
    pub forest: TaskForest,
}

/// Summary returned by `rebuild_skeleton_cache`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub built: usize,
    pub skipped: usize,
    /// Total per-task errors across refresh and resolution (list is capped)
    pub error_count: usize,
    pub errors: Vec<TaskErrorRecord>,
    pub duration_ms: u64,
    // ---- Resolution outcome ----
    pub total_tasks: usize,
    pub resolved: usize,
    pub roots_detected: usize,
    pub trusted_existing: usize,
    pub unresolved: usize,
    pub cycles_rejected: usize,
}

/// The state-management core behind the tool surface.
pub struct StateService {
    config: AtlasConfig,
    detector: StorageDetector,
    cache: SkeletonCache,
    state: RwLock<Arc<ResolvedState>>,
}

impl StateService {
    pub fn new(config: AtlasConfig) -> Result<Self, CoreError> {
        let detector = StorageDetector::new(&config.storage_roots);
        let cache = SkeletonCache::resolve(&config, &detector)?;
        Ok(Self {
            config,
            detector,
            cache,
            state: RwLock::new(Arc::new(ResolvedState::default())),
        })
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn cache(&self) -> &SkeletonCache {
        &self.cache
    }

    /// Current resolved snapshot. Cheap; safe to hold across awaits.
    pub fn snapshot(&self) -> Arc<ResolvedState> {
        Arc::clone(&self.state.read())
    }

    /// Cold start: load the cache from disk and resolve the hierarchy
    /// without touching the storage roots.
    pub fn load_from_cache(&self) -> Result<usize, CoreError> {
        let skeletons = self.cache.load()?;
        let count = skeletons.len();
        let (resolved, _report) = self.resolve_state(skeletons);
        *self.state.write() = Arc::new(resolved);
        Ok(count)
    }

    /// Scan the storage roots, refresh stale skeletons, re-resolve the
    /// hierarchy, and commit. Single-writer: callers must not overlap
    /// rebuilds.
    pub async fn rebuild_skeleton_cache(
        &self,
        force_rebuild: bool,
        cancel: &CancellationFlag,
    ) -> Result<RebuildSummary, CoreError> {
        let started = Instant::now();
        let force = force_rebuild || self.config.force_rebuild;

        let (skeletons, refresh) =
            build_or_refresh(&self.cache, &self.detector, &self.config, force, cancel).await?;

        let (resolved_state, report) = self.resolve_state(skeletons);

        // Persist resolution fields so a cold load starts from the same
        // forest this pass computed.
        self.cache.commit(&resolved_state.skeletons)?;

        let total_tasks = resolved_state.skeletons.len();
        *self.state.write() = Arc::new(resolved_state);

        let mut errors = refresh.errors;
        let error_count = refresh.error_count + report.errors.len();
        errors.extend(report.errors);
        errors.truncate(crate::error::ERROR_TAIL_CAP);

        Ok(RebuildSummary {
            built: refresh.built,
            skipped: refresh.skipped,
            error_count,
            errors,
            duration_ms: started.elapsed().as_millis() as u64,
            total_tasks,
            resolved: report.resolved,
            roots_detected: report.roots_detected,
            trusted_existing: report.trusted_existing,
            unresolved: report.unresolved,
            cycles_rejected: report.cycles_rejected,
        })
    }

    /// One skeleton by id.
    pub fn get_skeleton(&self, task_id: &str) -> Result<TaskSkeleton, CoreError> {
        self.snapshot()
            .skeletons
            .get(task_id)
            .cloned()
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))
    }

    /// Root tasks, optionally restricted to one workspace.
    pub fn list_roots(&self, workspace: Option<&str>) -> Vec<String> {
        self.snapshot().forest.roots_in(workspace)
    }

    pub fn children_of(&self, task_id: &str) -> Result<Vec<String>, CoreError> {
        let state = self.snapshot();
        if !state.forest.contains(task_id) {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(state.forest.children_of(task_id).to_vec())
    }

    pub fn ancestors_of(&self, task_id: &str, max_depth: usize) -> Result<Vec<String>, CoreError> {
        let state = self.snapshot();
        if !state.forest.contains(task_id) {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(state.forest.ancestors_of(task_id, max_depth))
    }

    pub fn descendants_of(
        &self,
        task_id: &str,
        max_depth: usize,
        max_nodes: usize,
    ) -> Result<Vec<String>, CoreError> {
        let state = self.snapshot();
        if !state.forest.contains(task_id) {
            return Err(CoreError::TaskNotFound(task_id.to_string()));
        }
        Ok(state.forest.descendants_of(task_id, max_depth, max_nodes))
    }

    /// Chunk one task's content for the search index. Re-reads the UI log
    /// from disk so chunks always reflect the current source.
    pub fn chunks_of(&self, task_id: &str) -> Result<Vec<TaskChunk>, CoreError> {
        let skeleton = self.get_skeleton(task_id)?;
        let handle = self
            .detector
            .find_task(task_id)
            .ok_or_else(|| CoreError::TaskNotFound(task_id.to_string()))?;
        let triple = self.detector.open_triple(&handle.path)?;
        let messages = triple
            .ui_log
            .as_deref()
            .map(parse_ui_log)
            .map(|p| p.messages)
            .unwrap_or_default();

        let chunker =
            TaskChunker::new(self.config.chunk_max_bytes, self.config.host_identifier.as_str());
        Ok(chunker.chunk_task(&skeleton, &messages))
    }

    /// Phase 1 (index build) then Phase 2 (resolution) over a skeleton map,
    /// then forest materialization.
    fn resolve_state(
        &self,
        mut skeletons: HashMap<String, TaskSkeleton>,
    ) -> (ResolvedState, Phase2Report) {
        let (index, _phase1) = build_instruction_index(&skeletons);
        let report = resolve_hierarchy(
            &mut skeletons,
            &index,
            &self.config.root_patterns,
            self.config.prefix_length,
        );
        let forest = TaskForest::from_skeletons(&skeletons);
        (ResolvedState { skeletons, forest }, report)
    }
}
