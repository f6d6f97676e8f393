//! Task-directory enumeration and triple reading.
//!
//! A subdirectory is a task iff its name has the task-id (UUID) shape and it
//! contains `task_metadata.json`. Hidden and reserved names are excluded.
//! Files are read with BOM tolerance; a missing file is `None`, not an error.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::storage::roots::{resolve_storage_roots, tasks_dir};

/// Distinguished checksum value for a file that does not exist.
pub const ABSENT_CHECKSUM: &str = "absent";

/// File names of the task triple.
pub const METADATA_FILE: &str = "task_metadata.json";
pub const UI_LOG_FILE: &str = "ui_messages.json";
pub const API_LOG_FILE: &str = "api_conversation_history.json";

/// Reserved directory names that are never tasks.
const RESERVED_NAMES: &[&str] = &[".skeleton-cache", ".skeletons"];

/// Handle to one discovered task directory.
#[derive(Debug, Clone)]
pub struct TaskDirHandle {
    pub task_id: String,
    pub path: PathBuf,
}

/// The raw bytes of a task's three source files. Any may be absent.
#[derive(Debug, Clone, Default)]
pub struct TaskTriple {
    pub metadata: Option<Vec<u8>>,
    pub ui_log: Option<Vec<u8>>,
    pub api_log: Option<Vec<u8>>,
}

impl TaskTriple {
    /// Total byte size of the present files.
    pub fn total_size(&self) -> u64 {
        [&self.metadata, &self.ui_log, &self.api_log]
            .iter()
            .filter_map(|f| f.as_ref().map(|b| b.len() as u64))
            .sum()
    }
}

/// Enumerates task directories under the configured storage roots.
#[derive(Debug, Clone)]
pub struct StorageDetector {
    roots: Vec<PathBuf>,
}

impl StorageDetector {
    pub fn new(configured_roots: &[PathBuf]) -> Self {
        Self {
            roots: resolve_storage_roots(configured_roots),
        }
    }

    /// The resolved storage roots this detector scans.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Enumerate all task directories across all roots.
    ///
    /// Order is unspecified. Errors reading one root or one entry are logged
    /// and skipped; they never abort the scan.
    pub fn scan_all(&self) -> Vec<TaskDirHandle> {
        let mut handles = Vec::new();
        for root in &self.roots {
            let dir = tasks_dir(root);
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read tasks directory {:?}: {}", dir, e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_dir() {
                    continue;
                }
                let name = match path.file_name() {
                    Some(n) => n.to_string_lossy().to_string(),
                    None => continue,
                };
                if !is_task_dir_name(&name) {
                    continue;
                }
                if !path.join(METADATA_FILE).exists() {
                    log::debug!("Skipping {:?} (no {})", path, METADATA_FILE);
                    continue;
                }
                handles.push(TaskDirHandle {
                    task_id: name,
                    path,
                });
            }
        }
        handles
    }

    /// Locate one task directory by id across all roots.
    pub fn find_task(&self, task_id: &str) -> Option<TaskDirHandle> {
        if !is_task_dir_name(task_id) {
            return None;
        }
        for root in &self.roots {
            let path = tasks_dir(root).join(task_id);
            if path.is_dir() && path.join(METADATA_FILE).exists() {
                return Some(TaskDirHandle {
                    task_id: task_id.to_string(),
                    path,
                });
            }
        }
        None
    }

    /// Read the full triple for one task directory.
    pub fn open_triple(&self, task_dir: &Path) -> std::io::Result<TaskTriple> {
        Ok(TaskTriple {
            metadata: read_optional(&task_dir.join(METADATA_FILE))?,
            ui_log: read_optional(&task_dir.join(UI_LOG_FILE))?,
            api_log: read_optional(&task_dir.join(API_LOG_FILE))?,
        })
    }
}

/// Task directories are UUID-named; anything else (hidden dirs, reserved
/// cache dirs, stray folders) is excluded from the scan.
pub fn is_task_dir_name(name: &str) -> bool {
    if name.starts_with('.') {
        return false;
    }
    if RESERVED_NAMES.contains(&name) {
        return false;
    }
    uuid::Uuid::parse_str(name).is_ok()
}

/// Read a file's bytes, stripping a UTF-8 BOM if present.
/// Returns `None` when the file does not exist.
fn read_optional(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(strip_bom(bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn strip_bom(bytes: Vec<u8>) -> Vec<u8> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        bytes[3..].to_vec()
    } else {
        bytes
    }
}

/// SHA-256 hex checksum of a file's raw bytes, or the distinguished
/// absent value when the file is missing.
pub fn checksum(bytes: Option<&[u8]>) -> String {
    match bytes {
        Some(b) => {
            let mut hasher = Sha256::new();
            hasher.update(b);
            hex::encode(hasher.finalize())
        }
        None => ABSENT_CHECKSUM.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_shaped_names_are_tasks() {
        assert!(is_task_dir_name("3f8e1a60-8f2e-4a6b-9a7e-111111111111"));
        assert!(!is_task_dir_name(".skeleton-cache"));
        assert!(!is_task_dir_name(".skeletons"));
        assert!(!is_task_dir_name("not-a-uuid"));
        assert!(!is_task_dir_name("1711111111111")); // epoch-ms names are not this host's shape
    }

    #[test]
    fn bom_is_stripped() {
        let with_bom = vec![0xEF, 0xBB, 0xBF, b'[', b']'];
        assert_eq!(strip_bom(with_bom), b"[]");
        assert_eq!(strip_bom(b"[]".to_vec()), b"[]");
    }

    #[test]
    fn absent_checksum_is_distinguished() {
        assert_eq!(checksum(None), ABSENT_CHECKSUM);
        let a = checksum(Some(b"hello"));
        let b = checksum(Some(b"hello"));
        let c = checksum(Some(b"hello "));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, ABSENT_CHECKSUM);
    }

    #[test]
    fn scan_skips_non_task_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let tasks = tmp.path().join("tasks");
        std::fs::create_dir_all(&tasks).unwrap();

        let id = "3f8e1a60-8f2e-4a6b-9a7e-111111111111";
        let task_dir = tasks.join(id);
        std::fs::create_dir_all(&task_dir).unwrap();
        std::fs::write(task_dir.join(METADATA_FILE), "{}").unwrap();

        // Decoys: hidden dir, non-uuid dir, uuid dir without metadata
        std::fs::create_dir_all(tasks.join(".skeletons")).unwrap();
        std::fs::create_dir_all(tasks.join("scratch")).unwrap();
        std::fs::create_dir_all(tasks.join("3f8e1a60-8f2e-4a6b-9a7e-222222222222")).unwrap();

        let detector = StorageDetector::new(&[tmp.path().to_path_buf()]);
        let handles = detector.scan_all();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].task_id, id);
    }

    #[test]
    fn open_triple_tolerates_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("t");
        std::fs::create_dir_all(&dir).unwrap();
        let metadata = r#"{"workspace":"/w"}"#;
        std::fs::write(dir.join(METADATA_FILE), metadata).unwrap();

        let detector = StorageDetector::new(&[tmp.path().to_path_buf()]);
        let triple = detector.open_triple(&dir).unwrap();
        assert!(triple.metadata.is_some());
        assert!(triple.ui_log.is_none());
        assert!(triple.api_log.is_none());
        assert_eq!(triple.total_size(), metadata.len() as u64);
    }
}
