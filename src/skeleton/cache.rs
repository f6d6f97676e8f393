//! On-disk skeleton cache with content-hash driven incremental refresh.
//!
//! Single logical map `task_id → skeleton`, stored as one versioned JSON
//! file. Readers reject unknown schema versions; individually corrupt
//! entries are dropped, never the whole load. Writes commit atomically:
//! serialize to a temp file in the cache directory, then rename over the
//! target — a crash mid-refresh leaves the previous cache intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::config::AtlasConfig;
use crate::error::{cap_error_tail, CoreError, ErrorKind, TaskErrorRecord};
use crate::skeleton::builder::{build_skeleton, triple_checksums};
use crate::skeleton::types::TaskSkeleton;
use crate::storage::{StorageDetector, TaskDirHandle};

/// Schema version of the cache file. Bump on any incompatible change.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Default cache file location under a storage root.
pub const CACHE_DIR_NAME: &str = ".skeleton-cache";
pub const CACHE_FILE_NAME: &str = "skeletons.json";

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    /// Entries kept as raw values on load so one corrupt skeleton cannot
    /// poison the rest.
    skeletons: HashMap<String, serde_json::Value>,
}

/// Cooperative cancellation signal for long operations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts reported by one refresh pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    /// Skeletons rebuilt this pass
    pub built: usize,
    /// Skeletons skipped because their source checksums were unchanged
    pub skipped: usize,
    /// Total per-task errors (the `errors` list is capped)
    pub error_count: usize,
    /// Capped per-task error tail
    pub errors: Vec<TaskErrorRecord>,
    pub duration_ms: u64,
}

/// The on-disk skeleton store.
#[derive(Debug, Clone)]
pub struct SkeletonCache {
    path: PathBuf,
}

impl SkeletonCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolve the cache path: explicit config wins, else
    /// `.skeleton-cache/skeletons.json` under the first storage root.
    pub fn resolve(config: &AtlasConfig, detector: &StorageDetector) -> Result<Self, CoreError> {
        if let Some(path) = &config.cache_path {
            return Ok(Self::new(path.clone()));
        }
        let root = detector.roots().first().ok_or(CoreError::NoStorageRoots)?;
        Ok(Self::new(root.join(CACHE_DIR_NAME).join(CACHE_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole cache into memory.
    ///
    /// Missing file = empty map. An unknown schema version or an unreadable
    /// top level is an error; a corrupt individual entry is dropped with a
    /// warning.
    pub fn load(&self) -> Result<HashMap<String, TaskSkeleton>, CoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        let file: CacheFile = serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::CacheCorrupt(e.to_string()))?;
        if file.version != CACHE_SCHEMA_VERSION {
            return Err(CoreError::CacheVersionMismatch {
                found: file.version,
                expected: CACHE_SCHEMA_VERSION,
            });
        }

        let mut map = HashMap::with_capacity(file.skeletons.len());
        let mut dropped = 0usize;
        for (task_id, value) in file.skeletons {
            match serde_json::from_value::<TaskSkeleton>(value) {
                Ok(skeleton) => {
                    map.insert(task_id, skeleton);
                }
                Err(e) => {
                    log::warn!("Dropping corrupt cached skeleton {}: {}", task_id, e);
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            log::warn!("Skeleton cache load dropped {} corrupt entries", dropped);
        }
        log::info!("Loaded {} skeletons from cache {:?}", map.len(), self.path);
        Ok(map)
    }

    /// Atomically replace the on-disk cache with the given map.
    pub fn commit(&self, skeletons: &HashMap<String, TaskSkeleton>) -> Result<(), CoreError> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| CoreError::CacheWriteFailed("cache path has no parent".into()))?;
        std::fs::create_dir_all(dir)
            .map_err(|e| CoreError::CacheWriteFailed(format!("create {:?}: {}", dir, e)))?;

        let file = CacheFile {
            version: CACHE_SCHEMA_VERSION,
            skeletons: skeletons
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or_default()))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| CoreError::CacheWriteFailed(e.to_string()))?;

        // Temp file in the same directory, then rename: the rename is the
        // all-or-nothing boundary visible to readers.
        let tmp = dir.join(format!("{}.tmp-{}", CACHE_FILE_NAME, std::process::id()));
        std::fs::write(&tmp, &json)
            .map_err(|e| CoreError::CacheWriteFailed(format!("write {:?}: {}", tmp, e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            CoreError::CacheWriteFailed(format!("rename into {:?}: {}", self.path, e))
        })?;
        log::info!("Committed {} skeletons to {:?}", skeletons.len(), self.path);
        Ok(())
    }

    /// Fetch one cached skeleton.
    pub fn get(&self, task_id: &str) -> Result<Option<TaskSkeleton>, CoreError> {
        Ok(self.load()?.remove(task_id))
    }

    /// Insert or replace one skeleton, committing the whole map.
    pub fn put(&self, skeleton: TaskSkeleton) -> Result<(), CoreError> {
        let mut map = self.load()?;
        map.insert(skeleton.task_id.clone(), skeleton);
        self.commit(&map)
    }

    /// Remove one skeleton, committing the whole map.
    pub fn delete(&self, task_id: &str) -> Result<(), CoreError> {
        let mut map = self.load()?;
        map.remove(task_id);
        self.commit(&map)
    }
}

enum TaskOutcome {
    Built(Box<TaskSkeleton>, Vec<TaskErrorRecord>),
    Skipped(String),
    Failed(TaskErrorRecord),
}

/// Scan every task directory and rebuild the skeletons whose source
/// checksums changed (or all of them under `force_rebuild`).
///
/// Bounded fan-out: `scan_concurrency` workers each own one task's triple
/// end-to-end; a single aggregator owns the map. The updated map is
/// committed atomically at the end; cancellation discards partial results
/// and leaves the on-disk cache untouched.
pub async fn build_or_refresh(
    cache: &SkeletonCache,
    detector: &StorageDetector,
    config: &AtlasConfig,
    force_rebuild: bool,
    cancel: &CancellationFlag,
) -> Result<(HashMap<String, TaskSkeleton>, RefreshSummary), CoreError> {
    let started = Instant::now();

    // A version-mismatched or corrupt cache means a cold rebuild, not a
    // failed refresh.
    let cached: Arc<HashMap<String, TaskSkeleton>> = Arc::new(match cache.load() {
        Ok(map) => map,
        Err(CoreError::CacheVersionMismatch { found, expected }) => {
            log::warn!(
                "Skeleton cache schema {} (expected {}), rebuilding from scratch",
                found,
                expected
            );
            HashMap::new()
        }
        Err(CoreError::CacheCorrupt(e)) => {
            log::warn!("Skeleton cache unreadable ({}), rebuilding from scratch", e);
            HashMap::new()
        }
        Err(e) => return Err(e),
    });

    let handles = detector.scan_all();
    log::info!(
        "Refreshing skeletons for {} tasks (force_rebuild={})",
        handles.len(),
        force_rebuild
    );

    let semaphore = Arc::new(Semaphore::new(config.scan_concurrency.max(1)));
    let timeout = Duration::from_millis(config.per_task_timeout_ms.max(1));
    let mut join_set = tokio::task::JoinSet::new();

    for handle in handles {
        if cancel.is_cancelled() {
            break;
        }
        let semaphore = Arc::clone(&semaphore);
        let cached = Arc::clone(&cached);
        let detector = detector.clone();
        let cancel = cancel.clone();
        let prefix_length = config.prefix_length;
        join_set.spawn(async move {
            let task_id = handle.task_id.clone();
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return TaskOutcome::Failed(TaskErrorRecord::new(
                        task_id,
                        ErrorKind::Cancelled,
                        "scan worker pool shut down",
                    ))
                }
            };
            if cancel.is_cancelled() {
                return TaskOutcome::Failed(TaskErrorRecord::new(
                    task_id,
                    ErrorKind::Cancelled,
                    "refresh cancelled",
                ));
            }
            let work = tokio::task::spawn_blocking(move || {
                process_one(&detector, &cached, &handle, force_rebuild, prefix_length)
            });
            match tokio::time::timeout(timeout, work).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_err)) => TaskOutcome::Failed(TaskErrorRecord::new(
                    task_id,
                    ErrorKind::SourceIo,
                    format!("worker panicked: {}", join_err),
                )),
                Err(_) => TaskOutcome::Failed(TaskErrorRecord::new(
                    task_id,
                    ErrorKind::Timeout,
                    format!("exceeded {}ms soft deadline", timeout.as_millis()),
                )),
            }
        });
    }

    // Single aggregator: the only writer of the new map.
    let mut next: HashMap<String, TaskSkeleton> = HashMap::new();
    let mut built = 0usize;
    let mut skipped = 0usize;
    let mut errors: Vec<TaskErrorRecord> = Vec::new();

    while let Some(res) = join_set.join_next().await {
        match res {
            Ok(TaskOutcome::Built(skeleton, warnings)) => {
                built += 1;
                errors.extend(warnings);
                next.insert(skeleton.task_id.clone(), *skeleton);
            }
            Ok(TaskOutcome::Skipped(task_id)) => {
                skipped += 1;
                if let Some(existing) = cached.get(&task_id) {
                    next.insert(task_id, existing.clone());
                }
            }
            Ok(TaskOutcome::Failed(record)) => errors.push(record),
            Err(join_err) => {
                log::error!("Refresh worker failed to join: {}", join_err);
            }
        }
    }

    if cancel.is_cancelled() {
        return Err(CoreError::Cancelled);
    }

    cache.commit(&next)?;

    let error_count = errors.len();
    let (errors, _) = cap_error_tail(errors);
    let summary = RefreshSummary {
        built,
        skipped,
        error_count,
        errors,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    log::info!(
        "Skeleton refresh: built={} skipped={} errors={} in {}ms",
        summary.built,
        summary.skipped,
        summary.error_count,
        summary.duration_ms
    );
    Ok((next, summary))
}

/// One worker's end-to-end unit: read the triple, compare checksums,
/// rebuild when stale.
fn process_one(
    detector: &StorageDetector,
    cached: &HashMap<String, TaskSkeleton>,
    handle: &TaskDirHandle,
    force_rebuild: bool,
    prefix_length: usize,
) -> TaskOutcome {
    let triple = match detector.open_triple(&handle.path) {
        Ok(t) => t,
        Err(e) => {
            return TaskOutcome::Failed(TaskErrorRecord::new(
                &handle.task_id,
                ErrorKind::SourceIo,
                e.to_string(),
            ))
        }
    };

    if !force_rebuild {
        if let Some(existing) = cached.get(&handle.task_id) {
            if existing.source_checksums == triple_checksums(&triple) {
                return TaskOutcome::Skipped(handle.task_id.clone());
            }
        }
    }

    match build_skeleton(&handle.task_id, &triple, prefix_length) {
        Ok(outcome) => TaskOutcome::Built(Box::new(outcome.skeleton), outcome.warnings),
        Err(record) => TaskOutcome::Failed(record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::types::SourceChecksums;

    fn skeleton(id: &str) -> TaskSkeleton {
        TaskSkeleton {
            task_id: id.to_string(),
            workspace: "/w".into(),
            created_at: None,
            last_activity: None,
            title: None,
            truncated_instruction: "do the thing carefully".into(),
            child_task_instruction_prefixes: vec![],
            parent_task_id: None,
            reconstructed_parent_id: None,
            parent_resolution_method: Default::default(),
            is_root_task: false,
            source_checksums: SourceChecksums::default(),
            message_count: 0,
            action_count: 0,
            total_size: 0,
        }
    }

    #[test]
    fn missing_cache_file_loads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SkeletonCache::new(tmp.path().join("skeletons.json"));
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn commit_then_load_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SkeletonCache::new(tmp.path().join("sub").join("skeletons.json"));
        let mut map = HashMap::new();
        map.insert("a".to_string(), skeleton("a"));
        map.insert("b".to_string(), skeleton("b"));
        cache.commit(&map).unwrap();

        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["a"].truncated_instruction, "do the thing carefully");
    }

    #[test]
    fn unknown_version_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skeletons.json");
        std::fs::write(&path, r#"{"version": 99, "skeletons": {}}"#).unwrap();
        let cache = SkeletonCache::new(path);
        match cache.load() {
            Err(CoreError::CacheVersionMismatch { found, expected }) => {
                assert_eq!(found, 99);
                assert_eq!(expected, CACHE_SCHEMA_VERSION);
            }
            other => panic!("expected version mismatch, got {:?}", other.map(|m| m.len())),
        }
    }

    #[test]
    fn corrupt_entry_is_dropped_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skeletons.json");
        let good = serde_json::to_value(skeleton("a")).unwrap();
        let file = serde_json::json!({
            "version": CACHE_SCHEMA_VERSION,
            "skeletons": {"a": good, "b": {"taskId": 42}}
        });
        std::fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();

        let cache = SkeletonCache::new(path);
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("a"));
    }

    #[test]
    fn put_get_delete() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SkeletonCache::new(tmp.path().join("skeletons.json"));
        cache.put(skeleton("a")).unwrap();
        assert!(cache.get("a").unwrap().is_some());
        cache.delete("a").unwrap();
        assert!(cache.get("a").unwrap().is_none());
    }

    #[test]
    fn no_stray_temp_file_after_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = SkeletonCache::new(tmp.path().join("skeletons.json"));
        cache.commit(&HashMap::new()).unwrap();
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![CACHE_FILE_NAME.to_string()]);
    }
}
