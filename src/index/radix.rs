//! Radix tree over normalized instruction prefixes.
//!
//! Exact-key lookup ONLY. No `starts_with` widening, no longest-common-prefix
//! fallback: a prefix that is not an exact stored key returns empty. Earlier
//! designs widened lookups over shorter keys and admitted many-to-one false
//! positives; exact equality on the full normalized surface is the contract.

use std::collections::HashMap;

/// One declared child invocation stored under a prefix key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Task that declared this child instruction in its UI log.
    pub parent_task_id: String,
    /// Best-effort timestamp of the declaring message (epoch ms).
    pub timestamp: u64,
}

#[derive(Debug, Default)]
struct Node {
    /// Compressed edges: first byte → (label, child).
    edges: HashMap<u8, (Vec<u8>, Node)>,
    /// Declarations stored at this exact key, if it is a key.
    declarations: Vec<Declaration>,
}

/// Compressed radix tree keyed on normalized-prefix bytes.
#[derive(Debug, Default)]
pub struct InstructionIndex {
    root: Node,
    key_count: usize,
    node_count: usize,
    insertion_count: usize,
}

impl InstructionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct prefix keys.
    pub fn len(&self) -> usize {
        self.key_count
    }

    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }

    /// Internal node count, for diagnostics.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Total accepted insertions (excluding idempotent repeats).
    pub fn insertion_count(&self) -> usize {
        self.insertion_count
    }

    /// Insert a declaration under a prefix. Idempotent per
    /// `(prefix, parent_task_id)`.
    pub fn insert(&mut self, prefix: &str, declaration: Declaration) {
        if prefix.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        let mut rest: &[u8] = prefix.as_bytes();
        let mut new_nodes = 0usize;

        loop {
            if rest.is_empty() {
                break;
            }
            let first = rest[0];
            if !node.edges.contains_key(&first) {
                // No edge: attach the remainder as one compressed edge.
                node.edges.insert(first, (rest.to_vec(), Node::default()));
                new_nodes += 1;
                node = &mut node.edges.get_mut(&first).unwrap().1;
                rest = &[];
                break;
            }

            let common = {
                let (label, _) = &node.edges[&first];
                common_prefix_len(label, rest)
            };
            let label_len = node.edges[&first].0.len();

            if common == label_len {
                // Edge fully matched; descend.
                node = &mut node.edges.get_mut(&first).unwrap().1;
                rest = &rest[common..];
                continue;
            }

            // Partial match: split the edge at `common`.
            let (old_label, old_child) = node.edges.remove(&first).unwrap();
            let mut mid = Node::default();
            let tail = old_label[common..].to_vec();
            mid.edges.insert(tail[0], (tail, old_child));
            new_nodes += 1;
            node.edges.insert(first, (old_label[..common].to_vec(), mid));
            node = &mut node.edges.get_mut(&first).unwrap().1;
            rest = &rest[common..];
        }

        self.node_count += new_nodes;
        if node.declarations.is_empty() {
            self.key_count += 1;
        }
        if node
            .declarations
            .iter()
            .any(|d| d.parent_task_id == declaration.parent_task_id)
        {
            return;
        }
        node.declarations.push(declaration);
        self.insertion_count += 1;
    }

    /// Every declaration stored under exactly this key, byte-for-byte.
    pub fn lookup_exact(&self, prefix: &str) -> &[Declaration] {
        let mut node = &self.root;
        let mut rest: &[u8] = prefix.as_bytes();
        while !rest.is_empty() {
            let Some((label, child)) = node.edges.get(&rest[0]) else {
                return &[];
            };
            if rest.len() < label.len() || &rest[..label.len()] != label.as_slice() {
                return &[];
            }
            rest = &rest[label.len()..];
            node = child;
        }
        &node.declarations
    }
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(parent: &str, ts: u64) -> Declaration {
        Declaration {
            parent_task_id: parent.to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn insert_then_exact_lookup() {
        let mut index = InstructionIndex::new();
        index.insert("implement the login endpoint", decl("a", 1));
        let hits = index.lookup_exact("implement the login endpoint");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].parent_task_id, "a");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn lookup_never_widens_to_startswith() {
        let mut index = InstructionIndex::new();
        index.insert("implement the login endpoint with sessions", decl("a", 1));
        // A proper prefix of a stored key is NOT a hit.
        assert!(index.lookup_exact("implement the login endpoint").is_empty());
        // An extension of a stored key is NOT a hit either.
        assert!(index
            .lookup_exact("implement the login endpoint with sessions and more")
            .is_empty());
    }

    #[test]
    fn shared_prefixes_split_correctly() {
        let mut index = InstructionIndex::new();
        index.insert("refactor the cache layer", decl("a", 1));
        index.insert("refactor the config loader", decl("b", 2));
        index.insert("refactor", decl("c", 3));
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup_exact("refactor the cache layer")[0].parent_task_id, "a");
        assert_eq!(index.lookup_exact("refactor the config loader")[0].parent_task_id, "b");
        assert_eq!(index.lookup_exact("refactor")[0].parent_task_id, "c");
        assert!(index.lookup_exact("refactor the").is_empty());
    }

    #[test]
    fn insert_is_idempotent_per_prefix_and_parent() {
        let mut index = InstructionIndex::new();
        index.insert("fix the flaky integration test", decl("a", 1));
        index.insert("fix the flaky integration test", decl("a", 99));
        assert_eq!(index.lookup_exact("fix the flaky integration test").len(), 1);
        assert_eq!(index.insertion_count(), 1);
    }

    #[test]
    fn one_key_many_declaring_parents() {
        let mut index = InstructionIndex::new();
        index.insert("run the release checklist", decl("a", 1));
        index.insert("run the release checklist", decl("b", 2));
        let hits = index.lookup_exact("run the release checklist");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn empty_prefix_is_never_a_key() {
        let mut index = InstructionIndex::new();
        index.insert("", decl("a", 1));
        assert!(index.lookup_exact("").is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn unicode_keys_match_byte_exact() {
        let mut index = InstructionIndex::new();
        index.insert("corrige l'intégration déjà livrée", decl("a", 1));
        assert_eq!(index.lookup_exact("corrige l'intégration déjà livrée").len(), 1);
        assert!(index.lookup_exact("corrige l'integration deja livree").is_empty());
    }
}
