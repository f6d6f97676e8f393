//! Phase 2 — parent resolution over the populated instruction index.
//!
//! Per task: root-pattern detection first, then trust of an existing
//! host-provided parent, then exact-prefix lookup guarded by workspace
//! isolation, the temporal window, and cycle rejection. Tentative links are
//! computed independently and installed in a second pass so any processing
//! order yields the same forest.
//!
//! Earlier designs carried metadata-based and temporal-proximity fallbacks;
//! they produced false links and were removed. Exact-prefix match is the
//! only reconstruction method.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, TaskErrorRecord};
use crate::extract::normalize_prefix;
use crate::index::InstructionIndex;
use crate::skeleton::{ParentResolutionMethod, TaskSkeleton};

/// Counts reported by one Phase-2 pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Report {
    pub processed: usize,
    /// Links reconstructed via exact-prefix match
    pub resolved: usize,
    /// Tasks classified as conversational roots
    pub roots_detected: usize,
    /// Tasks whose host-provided parent link was kept
    pub trusted_existing: usize,
    /// Tasks with no trustworthy parent evidence
    pub unresolved: usize,
    /// Links rejected because installing them would close a cycle
    pub cycles_rejected: usize,
    pub errors: Vec<TaskErrorRecord>,
}

/// Per-task tentative decision from the independent pass.
enum Decision {
    Root,
    /// Keep the host-provided link (validated for existence already).
    Trusted(String),
    /// Install this reconstructed link unless it closes a cycle.
    Resolved(String),
    Unresolved,
}

/// Resolve every skeleton's parent in place.
///
/// Deterministic: iteration orders are sorted, ties break on task id.
/// Re-running over the same map produces the identical result.
pub fn resolve_hierarchy(
    skeletons: &mut HashMap<String, TaskSkeleton>,
    index: &InstructionIndex,
    root_patterns: &[String],
    prefix_length: usize,
) -> Phase2Report {
    let mut report = Phase2Report {
        processed: skeletons.len(),
        resolved: 0,
        roots_detected: 0,
        trusted_existing: 0,
        unresolved: 0,
        cycles_rejected: 0,
        errors: Vec::new(),
    };

    // Root patterns go through the same normalizer as instructions so the
    // configured literals match regardless of case and spacing. A trailing
    // space on a pattern is a word boundary ("hi " must not match
    // "historical…") and survives the normalizer's right-trim.
    let normalized_patterns: Vec<String> = root_patterns
        .iter()
        .map(|p| {
            let mut normalized = normalize_prefix(p, prefix_length);
            if !normalized.is_empty() && p.ends_with(char::is_whitespace) {
                normalized.push(' ');
            }
            normalized
        })
        .filter(|p| !p.is_empty())
        .collect();

    let mut task_ids: Vec<String> = skeletons.keys().cloned().collect();
    task_ids.sort();

    // ---- Pass 1: independent per-task decisions ----
    let mut decisions: HashMap<String, Decision> = HashMap::with_capacity(task_ids.len());
    for task_id in &task_ids {
        let skeleton = &skeletons[task_id];
        let decision = decide(skeleton, skeletons, index, &normalized_patterns, prefix_length);
        decisions.insert(task_id.clone(), decision);
    }

    // ---- Pass 2: install in creation order, rejecting cycle-closing links ----
    // Parents are created before the work they spawn, so creation order is a
    // topological order wherever the evidence is consistent; anything else is
    // exactly what the cycle guard is for.
    let mut install_order = task_ids.clone();
    install_order.sort_by_key(|id| (skeletons[id].created_at_ms().unwrap_or(i64::MAX), id.clone()));

    let mut installed: HashMap<String, Option<String>> =
        task_ids.iter().map(|id| (id.clone(), None)).collect();

    for task_id in &install_order {
        let Some(decision) = decisions.get(task_id) else {
            continue;
        };
        let (method, parent, is_root) = match decision {
            Decision::Root => (ParentResolutionMethod::RootDetected, None, true),
            Decision::Trusted(p) => {
                if creates_cycle(&installed, task_id, p) {
                    report.cycles_rejected += 1;
                    report.errors.push(TaskErrorRecord::new(
                        task_id.clone(),
                        ErrorKind::CycleDetected,
                        format!("host-provided parent {} would close a cycle", p),
                    ));
                    (ParentResolutionMethod::None, None, false)
                } else {
                    installed.insert(task_id.clone(), Some(p.clone()));
                    report.trusted_existing += 1;
                    // Host link kept as-is: nothing reconstructed.
                    let skeleton = skeletons.get_mut(task_id).unwrap();
                    skeleton.reconstructed_parent_id = None;
                    skeleton.parent_resolution_method = ParentResolutionMethod::None;
                    skeleton.is_root_task = false;
                    continue;
                }
            }
            Decision::Resolved(p) => {
                if creates_cycle(&installed, task_id, p) {
                    report.cycles_rejected += 1;
                    report.errors.push(TaskErrorRecord::new(
                        task_id.clone(),
                        ErrorKind::CycleDetected,
                        format!("reconstructed parent {} would close a cycle", p),
                    ));
                    (ParentResolutionMethod::None, None, false)
                } else {
                    installed.insert(task_id.clone(), Some(p.clone()));
                    (ParentResolutionMethod::RadixTreeExact, Some(p.clone()), false)
                }
            }
            Decision::Unresolved => (ParentResolutionMethod::None, None, false),
        };

        let skeleton = skeletons.get_mut(task_id).unwrap();
        skeleton.reconstructed_parent_id = parent;
        skeleton.parent_resolution_method = method;
        skeleton.is_root_task = is_root;

        match method {
            ParentResolutionMethod::RootDetected => report.roots_detected += 1,
            ParentResolutionMethod::RadixTreeExact => report.resolved += 1,
            ParentResolutionMethod::None => report.unresolved += 1,
        }
    }

    log::info!(
        "Phase 2: processed={} resolved={} roots={} trusted={} unresolved={} cycles_rejected={}",
        report.processed,
        report.resolved,
        report.roots_detected,
        report.trusted_existing,
        report.unresolved,
        report.cycles_rejected
    );
    report
}

/// The independent per-task decision: root pattern, trusted host link, or
/// exact-prefix candidate.
fn decide(
    child: &TaskSkeleton,
    skeletons: &HashMap<String, TaskSkeleton>,
    index: &InstructionIndex,
    normalized_patterns: &[String],
    prefix_length: usize,
) -> Decision {
    let normalized_self = normalize_prefix(&child.truncated_instruction, prefix_length);

    // 1. Root detection: conversational openers never have a spawning parent.
    if normalized_patterns
        .iter()
        .any(|p| normalized_self.starts_with(p.as_str()))
    {
        return Decision::Root;
    }

    // 2. Trust an existing host-provided parent when its skeleton exists.
    if let Some(host_parent) = &child.parent_task_id {
        if host_parent != &child.task_id && skeletons.contains_key(host_parent) {
            return Decision::Trusted(host_parent.clone());
        }
    }

    // 3. Exact-prefix lookup with guards.
    if normalized_self.is_empty() {
        return Decision::Unresolved;
    }
    let child_last_activity = child.last_activity_ms();
    let child_ref = child.created_at_ms().or(child_last_activity);

    let mut survivors: Vec<(&TaskSkeleton, i64)> = Vec::new();
    for declaration in index.lookup_exact(&normalized_self) {
        if declaration.parent_task_id == child.task_id {
            continue;
        }
        let Some(parent) = skeletons.get(&declaration.parent_task_id) else {
            continue;
        };
        // Workspace isolation: empty matches empty only.
        if parent.workspace != child.workspace {
            continue;
        }
        // Temporal: a parent cannot exist strictly after its child's last activity.
        let parent_created = parent.created_at_ms();
        if let (Some(p), Some(c)) = (parent_created, child_last_activity) {
            if p > c {
                continue;
            }
        }
        survivors.push((parent, parent_created.unwrap_or(i64::MIN)));
    }

    // Among survivors, the one created closest to but not after the child.
    let reference = match child_ref {
        Some(r) => r,
        None => i64::MAX,
    };
    survivors.retain(|(_, created)| *created <= reference);
    survivors.sort_by(|(a, a_created), (b, b_created)| {
        b_created
            .cmp(a_created)
            .then_with(|| a.task_id.cmp(&b.task_id))
    });

    match survivors.first() {
        Some((parent, _)) => Decision::Resolved(parent.task_id.clone()),
        None => Decision::Unresolved,
    }
}

/// Would linking `child → parent` close a cycle, given the links installed
/// so far?
fn creates_cycle(
    installed: &HashMap<String, Option<String>>,
    child: &str,
    parent: &str,
) -> bool {
    let mut current = Some(parent.to_string());
    let mut steps = 0usize;
    while let Some(cur) = current {
        if cur == child {
            return true;
        }
        steps += 1;
        if steps > installed.len() {
            // Defect in the installed set itself; refuse the link.
            return true;
        }
        current = installed.get(&cur).and_then(|p| p.clone());
    }
    false
}
