//! Storage-root resolution for host task data.
//!
//! Contains:
//! - Environment-dependent path construction
//! - Probing of known host global-storage locations
//!
//! This module must contain no parsing logic.

use std::path::PathBuf;

/// Global-storage directory names of the host extensions whose task stores
/// this crate understands.
const KNOWN_HOST_STORES: &[&str] = &[
    "saoudrizwan.claude-dev",
    "rooveterinaryinc.roo-cline",
];

/// Return the storage roots to scan.
///
/// Configured roots win. When none are configured, probe the VS Code
/// global-storage layout for each known host extension:
/// `<user data>/Code/User/globalStorage/<extension>` — each root is expected
/// to contain a `tasks/` subdirectory.
pub fn resolve_storage_roots(configured: &[PathBuf]) -> Vec<PathBuf> {
    if !configured.is_empty() {
        return configured.to_vec();
    }

    let mut roots = Vec::new();
    for base in candidate_user_dirs() {
        let global_storage = base.join("Code").join("User").join("globalStorage");
        for store in KNOWN_HOST_STORES {
            let root = global_storage.join(store);
            if root.join("tasks").is_dir() {
                roots.push(root);
            }
        }
    }

    if roots.is_empty() {
        log::warn!("No host task storage found under known global-storage locations");
    }
    roots
}

/// Platform user-data directories to probe, most specific first.
fn candidate_user_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(appdata) = std::env::var("APPDATA") {
        dirs.push(PathBuf::from(appdata));
    }
    if let Some(base) = directories::BaseDirs::new() {
        // Linux: ~/.config, macOS: ~/Library/Application Support
        dirs.push(base.config_dir().to_path_buf());
    }
    dirs.dedup();
    dirs
}

/// Directory holding task subdirectories under one storage root.
pub fn tasks_dir(root: &std::path::Path) -> PathBuf {
    root.join("tasks")
}
