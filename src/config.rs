//! Configuration for the task-atlas core.
//!
//! Loaded from a TOML file under the platform config directory; a commented
//! default file is written on first run. All knobs the hierarchy engine and
//! the skeleton cache honor live here.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default normalized-prefix length used for instruction matching.
pub const DEFAULT_PREFIX_LENGTH: usize = 192;
/// Default per-task soft deadline during scans.
pub const DEFAULT_PER_TASK_TIMEOUT_MS: u64 = 30_000;
/// Default bounded fan-out for the skeleton builder.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 8;
/// Default byte budget for a single search chunk.
pub const DEFAULT_CHUNK_MAX_BYTES: usize = 4_096;

#[derive(Debug, Deserialize, Clone)]
pub struct AtlasConfig {
    /// Absolute paths scanned for task directories. Empty = probe the known
    /// host global-storage locations.
    #[serde(default)]
    pub storage_roots: Vec<PathBuf>,
    /// Where the skeleton cache file lives. None = `.skeleton-cache/skeletons.json`
    /// under the first storage root.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_per_task_timeout_ms")]
    pub per_task_timeout_ms: u64,
    /// Code points kept by the prefix normalizer on both index and lookup sides.
    #[serde(default = "default_prefix_length")]
    pub prefix_length: usize,
    /// Closed set of literal strings; a normalized-prefix match on a task's
    /// own instruction classifies it as a conversational root.
    #[serde(default = "default_root_patterns")]
    pub root_patterns: Vec<String>,
    #[serde(default)]
    pub force_rebuild: bool,
    /// Byte budget for one search chunk.
    #[serde(default = "default_chunk_max_bytes")]
    pub chunk_max_bytes: usize,
    /// Provenance label stamped on every chunk handed to the search index.
    #[serde(default = "default_host_identifier")]
    pub host_identifier: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // "DEBUG", "INFO", "WARN", "ERROR"
    #[serde(default = "default_log_to_console")]
    pub log_to_console: bool,
}

impl LoggingConfig {
    /// Filter for the log facade. Unrecognized values fall back to Info.
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.to_uppercase().as_str() {
            "ERROR" => log::LevelFilter::Error,
            "WARN" => log::LevelFilter::Warn,
            "DEBUG" => log::LevelFilter::Debug,
            _ => log::LevelFilter::Info,
        }
    }
}

fn default_log_to_console() -> bool {
    true
}

fn default_scan_concurrency() -> usize {
    DEFAULT_SCAN_CONCURRENCY
}

fn default_per_task_timeout_ms() -> u64 {
    DEFAULT_PER_TASK_TIMEOUT_MS
}

fn default_prefix_length() -> usize {
    DEFAULT_PREFIX_LENGTH
}

fn default_chunk_max_bytes() -> usize {
    DEFAULT_CHUNK_MAX_BYTES
}

fn default_host_identifier() -> String {
    "vscode".to_string()
}

/// The source corpus mixes French and English conversational openers; the set
/// stays plain configuration, matched as a prefix after normalization.
fn default_root_patterns() -> Vec<String> {
    [
        "hello",
        "hi ",
        "hey ",
        "bonjour",
        "salut",
        "i would like",
        "i want to",
        "i need",
        "can you",
        "could you",
        "please ",
        "je voudrais",
        "je veux",
        "j'ai besoin",
        "peux-tu",
        "pourrais-tu",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            log_to_console: true,
        }
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            storage_roots: Vec::new(),
            cache_path: None,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
            per_task_timeout_ms: DEFAULT_PER_TASK_TIMEOUT_MS,
            prefix_length: DEFAULT_PREFIX_LENGTH,
            root_patterns: default_root_patterns(),
            force_rebuild: false,
            chunk_max_bytes: DEFAULT_CHUNK_MAX_BYTES,
            host_identifier: default_host_identifier(),
            logging: LoggingConfig::default(),
        }
    }
}

/// This crate's own per-user directory, holding the config file and session
/// logs. Storage roots belong to the hosts and never live here.
///
/// `TASK_ATLAS_HOME` overrides the location; otherwise the same
/// `directories::BaseDirs` probe `storage::roots` uses for host stores
/// anchors it under the platform config dir.
pub fn atlas_home() -> PathBuf {
    if let Ok(custom) = std::env::var("TASK_ATLAS_HOME") {
        return PathBuf::from(custom);
    }
    match directories::BaseDirs::new() {
        Some(base) => base.config_dir().join("task-atlas"),
        None => std::env::temp_dir().join("task-atlas"),
    }
}

/// The config file under [`atlas_home`].
pub fn config_path() -> PathBuf {
    atlas_home().join("config.toml")
}

impl AtlasConfig {
    /// Where this session's log file goes: next to the skeleton cache when
    /// one is configured (scan diagnostics sit with the data they describe),
    /// else under [`atlas_home`].
    pub fn session_log_path(&self) -> PathBuf {
        let dir = self
            .cache_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(atlas_home);
        fs::create_dir_all(&dir).ok();
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        dir.join(format!("atlas_scan_{}.log", stamp))
    }
}

/// Load configuration from file, or create default if not exists
pub fn load_config() -> AtlasConfig {
    let config_path = config_path();

    if config_path.exists() {
        if let Ok(content) = fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<AtlasConfig>(&content) {
                return config;
            }
        }
    }

    // Create default config file if it doesn't exist
    let default_config = AtlasConfig::default();
    let toml_content = r#"# task-atlas configuration

# Absolute paths scanned for task directories.
# Empty = probe the known VS Code global-storage locations.
storage_roots = []

# Where the skeleton cache lives. Commented out = .skeleton-cache/skeletons.json
# under the first storage root.
# cache_path = "/path/to/skeletons.json"

# Bounded fan-out for the skeleton builder (workers per rebuild pass).
scan_concurrency = 8

# Soft deadline per task; exceeding it records an error and moves on.
per_task_timeout_ms = 30000

# Code points kept by the prefix normalizer. The same value is used when
# indexing declared children and when looking up a task's own instruction.
prefix_length = 192

[logging]
# Log level: "DEBUG", "INFO", "WARN", "ERROR"
level = "INFO"

# Whether to also log to console (useful for development)
log_to_console = true
"#;

    if let Some(dir) = config_path.parent() {
        fs::create_dir_all(dir).ok();
    }
    fs::write(&config_path, toml_content).ok();
    default_config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_knobs() {
        let cfg = AtlasConfig::default();
        assert_eq!(cfg.prefix_length, 192);
        assert!(cfg.scan_concurrency >= 1);
        assert!(!cfg.root_patterns.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: AtlasConfig = toml::from_str("scan_concurrency = 2\n").unwrap();
        assert_eq!(cfg.scan_concurrency, 2);
        assert_eq!(cfg.prefix_length, DEFAULT_PREFIX_LENGTH);
        assert!(cfg.storage_roots.is_empty());
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "loud".to_string(),
            log_to_console: false,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        let logging = LoggingConfig {
            level: "debug".to_string(),
            log_to_console: false,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn session_log_sits_next_to_a_configured_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = AtlasConfig {
            cache_path: Some(tmp.path().join("cache").join("skeletons.json")),
            ..AtlasConfig::default()
        };
        let log_path = cfg.session_log_path();
        assert_eq!(log_path.parent(), Some(tmp.path().join("cache").as_path()));
        assert!(log_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("atlas_scan_"));
    }
}
