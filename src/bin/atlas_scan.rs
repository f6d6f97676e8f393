//! Diagnostic entry point: scan the storage roots, rebuild the skeleton
//! cache, resolve the hierarchy, and print a summary.
//!
//! Usage: `atlas-scan [--force]`

use anyhow::Context;
use log::info;

use task_atlas::skeleton::CancellationFlag;
use task_atlas::{config, logging, StateService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config();
    logging::init_logging(&cfg);

    let force = std::env::args().any(|a| a == "--force");

    let service = StateService::new(cfg).context("failed to initialize state service")?;
    let cancel = CancellationFlag::new();

    let summary = service
        .rebuild_skeleton_cache(force, &cancel)
        .await
        .context("skeleton cache rebuild failed")?;

    info!("Scan complete in {}ms", summary.duration_ms);
    info!(
        "Tasks: total={} built={} skipped={} errors={}",
        summary.total_tasks, summary.built, summary.skipped, summary.error_count
    );
    info!(
        "Hierarchy: resolved={} roots={} trusted={} unresolved={} cycles_rejected={}",
        summary.resolved,
        summary.roots_detected,
        summary.trusted_existing,
        summary.unresolved,
        summary.cycles_rejected
    );
    for err in &summary.errors {
        info!("  [{}] {:?}: {}", err.task_id, err.kind, err.message);
    }

    let roots = service.list_roots(None);
    info!("Forest has {} roots", roots.len());

    Ok(())
}
