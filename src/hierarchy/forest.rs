//! Forest materialization and navigation over resolved skeletons.
//!
//! Tasks are records owned by the skeleton map; parent/child links are task
//! ids, never owning references. The navigator holds an immutable snapshot;
//! every query is read-only.
//!
//! Phase 2 guarantees acyclicity. Construction re-asserts it and panics on a
//! violation: a cyclic input here is a programming error, not a runtime
//! condition to recover from.

use std::collections::{HashMap, VecDeque};

use crate::skeleton::TaskSkeleton;

/// Immutable forest snapshot over a resolved skeleton map.
#[derive(Debug, Default)]
pub struct TaskForest {
    /// Effective parent per task (`None` = root).
    parent: HashMap<String, Option<String>>,
    /// Children per task, sorted for deterministic traversal.
    children: HashMap<String, Vec<String>>,
    /// Distance from the root of each task's tree.
    depth: HashMap<String, usize>,
    workspace: HashMap<String, String>,
    /// All roots, sorted.
    roots: Vec<String>,
}

impl TaskForest {
    /// Materialize the forest from a resolved skeleton map.
    ///
    /// A parent link pointing outside the map is ignored (the task becomes a
    /// root); Phase 2 never produces one, but a stale host-provided link can.
    ///
    /// # Panics
    ///
    /// Panics if the effective parent links contain a cycle. Phase 2 is
    /// required to make that impossible.
    pub fn from_skeletons(skeletons: &HashMap<String, TaskSkeleton>) -> Self {
        let mut parent: HashMap<String, Option<String>> = HashMap::with_capacity(skeletons.len());
        let mut children: HashMap<String, Vec<String>> = HashMap::with_capacity(skeletons.len());
        let mut workspace: HashMap<String, String> = HashMap::with_capacity(skeletons.len());

        for (task_id, skeleton) in skeletons {
            let effective = skeleton
                .effective_parent()
                .filter(|p| skeletons.contains_key(*p) && *p != task_id)
                .map(|p| p.to_string());
            if let Some(p) = &effective {
                children.entry(p.clone()).or_default().push(task_id.clone());
            }
            parent.insert(task_id.clone(), effective);
            workspace.insert(task_id.clone(), skeleton.workspace.clone());
        }
        for list in children.values_mut() {
            list.sort();
        }

        let depth = compute_depths(&parent);

        let mut roots: Vec<String> = parent
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(id, _)| id.clone())
            .collect();
        roots.sort();

        Self {
            parent,
            children,
            depth,
            workspace,
            roots,
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.parent.contains_key(task_id)
    }

    /// Direct children, sorted by task id. Empty for unknown tasks.
    pub fn children_of(&self, task_id: &str) -> &[String] {
        self.children.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ancestor chain, root first, excluding the task itself. At most
    /// `max_depth` nearest ancestors.
    pub fn ancestors_of(&self, task_id: &str, max_depth: usize) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = self.parent.get(task_id).and_then(|p| p.clone());
        while let Some(id) = current {
            if chain.len() >= max_depth {
                break;
            }
            current = self.parent.get(&id).and_then(|p| p.clone());
            chain.push(id);
        }
        chain.reverse();
        chain
    }

    /// Descendants in BFS order, excluding the task itself, bounded by depth
    /// and node count.
    pub fn descendants_of(&self, task_id: &str, max_depth: usize, max_nodes: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((task_id.to_string(), 0));
        while let Some((id, level)) = queue.pop_front() {
            if level >= max_depth {
                continue;
            }
            for child in self.children_of(&id) {
                if out.len() >= max_nodes {
                    return out;
                }
                out.push(child.clone());
                queue.push_back((child.clone(), level + 1));
            }
        }
        out
    }

    /// Distance from the task's root. `None` for unknown tasks.
    pub fn depth_of(&self, task_id: &str) -> Option<usize> {
        self.depth.get(task_id).copied()
    }

    /// Root tasks, optionally restricted to one workspace.
    pub fn roots_in(&self, workspace: Option<&str>) -> Vec<String> {
        match workspace {
            None => self.roots.clone(),
            Some(ws) => self
                .roots
                .iter()
                .filter(|id| self.workspace.get(*id).map(String::as_str) == Some(ws))
                .cloned()
                .collect(),
        }
    }
}

/// Depth of every task, walking parent chains with memoization.
///
/// Panics on a cycle — the Phase-2 contract makes one impossible.
fn compute_depths(parent: &HashMap<String, Option<String>>) -> HashMap<String, usize> {
    let mut depth: HashMap<String, usize> = HashMap::with_capacity(parent.len());
    for task_id in parent.keys() {
        if depth.contains_key(task_id) {
            continue;
        }
        // Walk up to the first node with a known depth (or a root), then
        // unwind the chain.
        let mut chain: Vec<String> = Vec::new();
        let mut current = task_id.clone();
        let base = loop {
            if let Some(d) = depth.get(&current) {
                break *d + 1;
            }
            assert!(
                !chain.contains(&current),
                "cycle in resolved forest at task {}",
                current
            );
            chain.push(current.clone());
            match parent.get(&current).and_then(|p| p.clone()) {
                Some(next) => current = next,
                None => break 0,
            }
        };
        // `chain` is ordered from the starting task up toward the root.
        for (i, id) in chain.iter().rev().enumerate() {
            depth.insert(id.clone(), base + i);
        }
    }
    depth
}
