//! Phase 1 — populate the instruction index from the skeleton map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::index::{Declaration, InstructionIndex};
use crate::skeleton::TaskSkeleton;

/// Counts reported by one Phase-1 pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Report {
    /// Skeletons walked
    pub processed: usize,
    /// Skeletons that contributed at least one prefix
    pub contributing: usize,
    /// Accepted insertions into the index
    pub insertions: usize,
    /// Distinct prefix keys in the index afterwards
    pub index_keys: usize,
    /// Internal radix-tree node count, for diagnostics
    pub index_nodes: usize,
}

/// Walk every skeleton and insert its declared child prefixes.
///
/// Order of tasks is irrelevant; insertion is idempotent per
/// `(prefix, parent)`.
pub fn build_instruction_index(
    skeletons: &HashMap<String, TaskSkeleton>,
) -> (InstructionIndex, Phase1Report) {
    let mut index = InstructionIndex::new();
    let mut contributing = 0usize;

    for skeleton in skeletons.values() {
        if skeleton.child_task_instruction_prefixes.is_empty() {
            continue;
        }
        contributing += 1;
        let timestamp = skeleton.created_at_ms().unwrap_or(0).max(0) as u64;
        for prefix in &skeleton.child_task_instruction_prefixes {
            index.insert(
                prefix,
                Declaration {
                    parent_task_id: skeleton.task_id.clone(),
                    timestamp,
                },
            );
        }
    }

    let report = Phase1Report {
        processed: skeletons.len(),
        contributing,
        insertions: index.insertion_count(),
        index_keys: index.len(),
        index_nodes: index.node_count(),
    };
    log::info!(
        "Phase 1: processed={} contributing={} insertions={} keys={}",
        report.processed,
        report.contributing,
        report.insertions,
        report.index_keys
    );
    (index, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::SourceChecksums;

    fn skeleton(id: &str, prefixes: &[&str]) -> TaskSkeleton {
        TaskSkeleton {
            task_id: id.to_string(),
            workspace: "/w".into(),
            created_at: Some("2025-03-01T10:00:00Z".into()),
            last_activity: None,
            title: None,
            truncated_instruction: String::new(),
            child_task_instruction_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
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
    fn index_contains_exactly_the_declared_prefixes() {
        let mut map = HashMap::new();
        map.insert("a".into(), skeleton("a", &["implement the login endpoint"]));
        map.insert("b".into(), skeleton("b", &[]));
        map.insert(
            "c".into(),
            skeleton("c", &["implement the login endpoint", "write the release notes"]),
        );

        let (index, report) = build_instruction_index(&map);
        assert_eq!(report.processed, 3);
        assert_eq!(report.contributing, 2);
        assert_eq!(report.insertions, 3);
        assert_eq!(index.len(), 2);

        let hits = index.lookup_exact("implement the login endpoint");
        assert_eq!(hits.len(), 2);
        assert!(index.lookup_exact("write the release notes").len() == 1);
        assert!(index.lookup_exact("never declared").is_empty());
    }
}
