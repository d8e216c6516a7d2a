//! # Maximal Clique Enumeration
//!
//! Bron–Kerbosch with pivoting over the small undirected "mergeable with"
//! graph of one split's branches.
//!
//! Output is deterministic: members ascending, cliques in lexicographic
//! order. Cliques may overlap.

use crate::graph::NodeId;
use std::collections::{BTreeMap, BTreeSet};

/// Undirected graph over node ids
#[derive(Debug, Clone, Default)]
pub struct MergeabilityGraph {
    adjacency: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl MergeabilityGraph {
    /// Graph with the given vertices and no edges
    pub fn new(vertices: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            adjacency: vertices.into_iter().map(|v| (v, BTreeSet::new())).collect(),
        }
    }

    /// Connect two vertices; self-loops are ignored
    pub fn add_edge(&mut self, a: NodeId, b: NodeId) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Returns true if `a` and `b` are connected
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.adjacency.get(&a).is_some_and(|n| n.contains(&b))
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    fn neighbors(&self, v: NodeId) -> BTreeSet<NodeId> {
        self.adjacency.get(&v).cloned().unwrap_or_default()
    }

    /// All maximal cliques with at least `min_size` members
    pub fn maximal_cliques(&self, min_size: usize) -> Vec<Vec<NodeId>> {
        let mut cliques = Vec::new();
        let candidates: BTreeSet<NodeId> = self.adjacency.keys().copied().collect();
        self.bron_kerbosch(&mut Vec::new(), candidates, BTreeSet::new(), &mut cliques);

        let mut cliques: Vec<Vec<NodeId>> = cliques
            .into_iter()
            .filter(|c| c.len() >= min_size)
            .map(|mut c| {
                c.sort();
                c
            })
            .collect();
        cliques.sort();
        cliques
    }

    fn bron_kerbosch(
        &self,
        current: &mut Vec<NodeId>,
        mut candidates: BTreeSet<NodeId>,
        mut excluded: BTreeSet<NodeId>,
        out: &mut Vec<Vec<NodeId>>,
    ) {
        if candidates.is_empty() {
            if excluded.is_empty() {
                out.push(current.clone());
            }
            return;
        }

        // Pivot with the most candidate neighbours; ties go to the lowest id
        let pivot = candidates
            .iter()
            .chain(excluded.iter())
            .copied()
            .max_by(|&a, &b| {
                let da = self.neighbors(a).intersection(&candidates).count();
                let db = self.neighbors(b).intersection(&candidates).count();
                da.cmp(&db).then(b.cmp(&a))
            });
        let pivot_neighbors = pivot.map(|p| self.neighbors(p)).unwrap_or_default();

        let branch: Vec<NodeId> = candidates.difference(&pivot_neighbors).copied().collect();
        for v in branch {
            let neighbors = self.neighbors(v);
            current.push(v);
            self.bron_kerbosch(
                current,
                candidates.intersection(&neighbors).copied().collect(),
                excluded.intersection(&neighbors).copied().collect(),
                out,
            );
            current.pop();
            candidates.remove(&v);
            excluded.insert(v);
        }
    }
}
