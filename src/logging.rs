//! Session logging bootstrap.
//!
//! Every scan session writes its own timestamped log file (next to the
//! skeleton cache when one is configured), with an optional console mirror.
//! After initialization the effective scan setup is logged so a session log
//! is self-describing: which roots will be scanned, where the cache lives,
//! and the knobs the hierarchy engine will honor.

use std::fs::File;

use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use crate::config::AtlasConfig;

/// Initialize the logging system and log the effective scan setup.
///
/// Safe to call when a logger is already installed (repeat calls are no-ops).
pub fn init_logging(config: &AtlasConfig) {
    let level = config.logging.level_filter();
    let format = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(log::LevelFilter::Off)
        .build();

    let log_path = config.session_log_path();
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if let Ok(file) = File::create(&log_path) {
        loggers.push(WriteLogger::new(level, format.clone(), file));
    }
    if config.logging.log_to_console || loggers.is_empty() {
        loggers.push(TermLogger::new(
            level,
            format,
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }
    if CombinedLogger::init(loggers).is_err() {
        return;
    }

    log::info!("task-atlas session log: {:?}", log_path);
    if config.storage_roots.is_empty() {
        log::info!("No storage roots configured; probing known host global-storage locations");
    } else {
        for root in &config.storage_roots {
            log::info!("Storage root: {:?}", root);
        }
    }
    match &config.cache_path {
        Some(path) => log::info!("Skeleton cache: {:?}", path),
        None => log::info!("Skeleton cache: .skeleton-cache/skeletons.json under the first root"),
    }
    log::debug!(
        "scan_concurrency={} per_task_timeout_ms={} prefix_length={} root_patterns={}",
        config.scan_concurrency,
        config.per_task_timeout_ms,
        config.prefix_length,
        config.root_patterns.len()
    );
}
