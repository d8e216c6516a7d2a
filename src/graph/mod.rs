//! # Proof Graph Store
//!
//! Owns the explored state space of a symbolic execution: nodes holding
//! configurations, multi-step rewrite edges, case-split hyperedges and
//! subsumption covers.
//!
//! ## Layout
//!
//! ```text
//! nodes:  NodeId            -> Node
//! edges:  (source, target)  -> Edge     (one per pair)
//! covers: (source, target)  -> Cover    (one per pair)
//! splits: source            -> Split    (one per source)
//! ```
//!
//! Everything is addressed by [`NodeId`], so inserting or removing a record
//! never walks the graph. Ordered maps keep every view and export sorted by
//! id.
//!
//! ## Invariants
//!
//! 1. Every edge, split and cover endpoint is an existing node
//! 2. A node with an outgoing split has no outgoing edge or cover
//! 3. Split targets never include the split source, and splits form a DAG
//! 4. Through the ingestion API a node is the target of at most one split
//!
//! Mutations validate first and only then apply, so a rejected call leaves
//! the graph untouched.

pub mod propagate;
pub mod serial;

pub use serial::{CoverDict, EdgeDict, GraphDict, NodeDict, SplitBranchDict, SplitDict, StepDict};

use crate::cterm::{CSubst, CTerm};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// Stable node identifier, never reused within one graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of the proof graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Unique id
    pub id: NodeId,
    /// Symbolic configuration
    pub cterm: CTerm,
}

/// One recorded segment of a rewrite chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeStep {
    /// Rewrite depth reached by this step (0 for a pure guard step)
    pub depth: u64,
    /// Labels of the rules applied, in order
    pub rules: Vec<String>,
    /// Bindings and assumptions justifying the step
    pub csubst: CSubst,
}

impl EdgeStep {
    /// Create a step
    pub fn new(depth: u64, rules: Vec<String>, csubst: CSubst) -> Self {
        Self {
            depth,
            rules,
            csubst,
        }
    }

    /// Guard step: no rewrites, only the branch condition that was taken
    pub fn guard(csubst: CSubst) -> Self {
        Self {
            depth: 0,
            rules: Vec::new(),
            csubst,
        }
    }

    /// True for steps that record a branch condition rather than rewrites
    pub fn is_guard(&self) -> bool {
        self.depth == 0 && self.rules.is_empty()
    }
}

/// A multi-step rewrite chain from `source` to `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Steps in execution order, never empty
    pub steps: Vec<EdgeStep>,
}

impl Edge {
    /// Net source to target transformation (the last step's csubst)
    pub fn csubst(&self) -> Option<&CSubst> {
        self.steps.last().map(|s| &s.csubst)
    }

    /// Depth reached at the target
    pub fn depth(&self) -> u64 {
        self.steps.last().map(|s| s.depth).unwrap_or(0)
    }

    /// All rule labels along the chain
    pub fn rules(&self) -> Vec<&str> {
        self.steps
            .iter()
            .flat_map(|s| s.rules.iter().map(String::as_str))
            .collect()
    }
}

/// A case split: execution continues in exactly one branch, selected by
/// the branch guards
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Branching node
    pub source: NodeId,
    /// Substitution shared by every branch
    pub csubst: CSubst,
    /// Branch guard per target, ascending target id
    pub targets: BTreeMap<NodeId, CSubst>,
}

impl Split {
    /// Target ids in branch order
    pub fn target_ids(&self) -> Vec<NodeId> {
        self.targets.keys().copied().collect()
    }

    /// Branch guard of `target`
    pub fn guard(&self, target: NodeId) -> Option<&CSubst> {
        self.targets.get(&target)
    }

    /// Shared substitution followed by the guard of `target`
    pub fn branch_csubst(&self, target: NodeId) -> Option<CSubst> {
        self.targets.get(&target).map(|g| self.csubst.extend(g))
    }
}

/// Witness that `source` is subsumed by `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    /// Subsumed node
    pub source: NodeId,
    /// Subsuming node
    pub target: NodeId,
    /// Instantiation of `target` that yields `source`
    pub csubst: CSubst,
}

/// Largest id a graph will hand out or import
///
/// Imported graphs start at most here, so `add_node` has 2^63 ids of
/// headroom and cannot wrap.
pub const MAX_NODE_ID: u64 = i64::MAX as u64;

/// The proof graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofGraph {
    /// Next id to hand out, always in `1..=MAX_NODE_ID` after `new` or
    /// `from_dict`
    next: u64,
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    splits: BTreeMap<NodeId, Split>,
    covers: BTreeMap<(NodeId, NodeId), Cover>,
}

impl Default for ProofGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofGraph {
    /// Create an empty graph; the first node gets id 1
    pub fn new() -> Self {
        Self {
            next: 1,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            splits: BTreeMap::new(),
            covers: BTreeMap::new(),
        }
    }

    /// Id the next `add_node` will assign
    pub fn next_id(&self) -> NodeId {
        NodeId(self.next)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════════

    /// Add a node holding `cterm` under a fresh id
    pub fn add_node(&mut self, cterm: CTerm) -> &Node {
        let id = NodeId(self.next);
        self.next += 1;
        self.nodes.insert(id, Node { id, cterm });
        &self.nodes[&id]
    }

    /// Node by id, if present
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Node by id, `NotFound` when absent
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or_else(|| Error::node_not_found(id))
    }

    /// Returns true if `id` is a node of this graph
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes, ascending id
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Overwrite the configuration of a node
    pub fn replace_cterm(&mut self, id: NodeId, cterm: CTerm) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| Error::node_not_found(id))?;
        node.cterm = cterm;
        Ok(())
    }

    /// Remove a node together with every edge, cover and split branch that
    /// touches it
    ///
    /// A split whose source is removed disappears; a split that loses its
    /// last branch disappears too. Split constraints are re-propagated when
    /// any split changed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let (node, splits_changed) = self.detach_node(id)?;
        if splits_changed {
            self.propagate_split_constraints()?;
        }
        Ok(node)
    }

    /// Cascading removal without re-propagation; also reports whether any
    /// split changed
    pub(crate) fn detach_node(&mut self, id: NodeId) -> Result<(Node, bool)> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| Error::node_not_found(id))?;

        self.edges
            .retain(|&(source, target), _| source != id && target != id);
        self.covers
            .retain(|&(source, target), _| source != id && target != id);

        let mut splits_changed = self.splits.remove(&id).is_some();
        for split in self.splits.values_mut() {
            splits_changed |= split.targets.remove(&id).is_some();
        }
        self.splits.retain(|_, split| !split.targets.is_empty());

        Ok((node, splits_changed))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Edges
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a rewrite chain from `source` to `target`
    pub fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        steps: Vec<EdgeStep>,
    ) -> Result<&Edge> {
        self.check_reference("create_edge", source)?;
        self.check_reference("create_edge", target)?;
        if steps.is_empty() {
            return Err(Error::InvalidEdge {
                message: format!("edge {} -> {} has no steps", source, target),
            });
        }
        if self.splits.contains_key(&source) {
            return Err(Error::conflict(format!(
                "node {} already has an outgoing split, cannot add edge to {}",
                source, target
            )));
        }
        if self.edges.contains_key(&(source, target)) {
            return Err(Error::conflict(format!(
                "edge {} -> {} already exists",
                source, target
            )));
        }

        let edge = Edge {
            source,
            target,
            steps,
        };
        Ok(self.edges.entry((source, target)).or_insert(edge))
    }

    /// Edge between two nodes, if present
    pub fn edge(&self, source: NodeId, target: NodeId) -> Option<&Edge> {
        self.edges.get(&(source, target))
    }

    /// Edges filtered by source and/or target, ascending `(source, target)`
    pub fn edges(&self, source: Option<NodeId>, target: Option<NodeId>) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|e| source.map_or(true, |s| e.source == s))
            .filter(|e| target.map_or(true, |t| e.target == t))
            .collect()
    }

    /// Remove the edge between two nodes
    pub fn remove_edge(&mut self, source: NodeId, target: NodeId) -> Result<Edge> {
        self.edges
            .remove(&(source, target))
            .ok_or_else(|| Error::edge_not_found(source, target))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Covers
    // ═══════════════════════════════════════════════════════════════════════

    /// Record that `source` is subsumed by `target`
    pub fn create_cover(
        &mut self,
        source: NodeId,
        target: NodeId,
        csubst: CSubst,
    ) -> Result<&Cover> {
        self.check_reference("create_cover", source)?;
        self.check_reference("create_cover", target)?;
        if self.splits.contains_key(&source) {
            return Err(Error::conflict(format!(
                "node {} already has an outgoing split, cannot add cover to {}",
                source, target
            )));
        }
        if self.covers.contains_key(&(source, target)) {
            return Err(Error::conflict(format!(
                "cover {} -> {} already exists",
                source, target
            )));
        }

        let cover = Cover {
            source,
            target,
            csubst,
        };
        Ok(self.covers.entry((source, target)).or_insert(cover))
    }

    /// Cover between two nodes, if present
    pub fn cover(&self, source: NodeId, target: NodeId) -> Option<&Cover> {
        self.covers.get(&(source, target))
    }

    /// Covers filtered by source and/or target, ascending `(source, target)`
    pub fn covers(&self, source: Option<NodeId>, target: Option<NodeId>) -> Vec<&Cover> {
        self.covers
            .values()
            .filter(|c| source.map_or(true, |s| c.source == s))
            .filter(|c| target.map_or(true, |t| c.target == t))
            .collect()
    }

    /// Remove the cover between two nodes
    pub fn remove_cover(&mut self, source: NodeId, target: NodeId) -> Result<Cover> {
        self.covers
            .remove(&(source, target))
            .ok_or_else(|| Error::cover_not_found(source, target))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Splits
    // ═══════════════════════════════════════════════════════════════════════

    /// Record a case split out of `source`
    ///
    /// `targets` maps each branch target to its guard; `csubst` is shared by
    /// all branches. Target constraints are re-propagated afterwards.
    pub fn create_split(
        &mut self,
        source: NodeId,
        targets: BTreeMap<NodeId, CSubst>,
        csubst: CSubst,
    ) -> Result<&Split> {
        let split = Split {
            source,
            csubst,
            targets,
        };
        self.attach_split(split, false)?;
        self.propagate_split_constraints()?;
        self.splits
            .get(&source)
            .ok_or_else(|| Error::split_not_found(source))
    }

    /// Split out of `source`, if present
    pub fn split(&self, source: NodeId) -> Option<&Split> {
        self.splits.get(&source)
    }

    /// Splits filtered by source and/or one of their targets, ascending source
    pub fn splits(&self, source: Option<NodeId>, target: Option<NodeId>) -> Vec<&Split> {
        self.splits
            .values()
            .filter(|s| source.map_or(true, |src| s.source == src))
            .filter(|s| target.map_or(true, |t| s.targets.contains_key(&t)))
            .collect()
    }

    /// Remove the split out of `source` and re-propagate constraints
    pub fn remove_split(&mut self, source: NodeId) -> Result<Split> {
        let split = self
            .splits
            .remove(&source)
            .ok_or_else(|| Error::split_not_found(source))?;
        self.propagate_split_constraints()?;
        Ok(split)
    }

    /// Take the split out of `source` without re-propagating
    pub(crate) fn detach_split(&mut self, source: NodeId) -> Option<Split> {
        self.splits.remove(&source)
    }

    /// Sources of every split that branches into `target`, ascending
    pub fn split_sources_of(&self, target: NodeId) -> Vec<NodeId> {
        self.splits
            .values()
            .filter(|s| s.targets.contains_key(&target))
            .map(|s| s.source)
            .collect()
    }

    /// Validate and insert a split without re-propagating
    ///
    /// With `shared_targets` a target may already belong to another split;
    /// every other invariant is still enforced.
    pub(crate) fn attach_split(&mut self, split: Split, shared_targets: bool) -> Result<()> {
        let source = split.source;
        self.check_reference("create_split", source)?;
        for &target in split.targets.keys() {
            self.check_reference("create_split", target)?;
        }
        if split.targets.is_empty() {
            return Err(Error::InvalidSplit {
                message: format!("split from {} has no branches", source),
            });
        }
        if self.splits.contains_key(&source) {
            return Err(Error::conflict(format!(
                "node {} already has an outgoing split",
                source
            )));
        }
        if !self.edges(Some(source), None).is_empty() || !self.covers(Some(source), None).is_empty()
        {
            return Err(Error::conflict(format!(
                "node {} already has an outgoing edge or cover, cannot split",
                source
            )));
        }
        if split.targets.contains_key(&source) {
            return Err(Error::conflict(format!(
                "split from {} targets its own source",
                source
            )));
        }
        if !shared_targets {
            for &target in split.targets.keys() {
                if let Some(owner) = self.split_sources_of(target).first() {
                    return Err(Error::conflict(format!(
                        "node {} is already the target of the split from {}",
                        target, owner
                    )));
                }
            }
        }
        if self.split_path_exists(&split.target_ids(), source) {
            return Err(Error::conflict(format!(
                "split from {} would close a cycle of splits",
                source
            )));
        }

        self.splits.insert(source, split);
        Ok(())
    }

    /// Whether `goal` is reachable from any of `from` through splits alone
    fn split_path_exists(&self, from: &[NodeId], goal: NodeId) -> bool {
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut stack: Vec<NodeId> = from.to_vec();
        while let Some(id) = stack.pop() {
            if id == goal {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(split) = self.splits.get(&id) {
                stack.extend(split.targets.keys().copied());
            }
        }
        false
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Traversal
    // ═══════════════════════════════════════════════════════════════════════

    /// Direct successors: edge targets, cover targets, then split targets
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        let edge_targets = self.edges(Some(id), None).into_iter().map(|e| e.target);
        let cover_targets = self.covers(Some(id), None).into_iter().map(|c| c.target);
        let split_targets = self
            .splits
            .get(&id)
            .into_iter()
            .flat_map(|s| s.targets.keys().copied());
        for target in edge_targets.chain(cover_targets).chain(split_targets) {
            if !out.contains(&target) {
                out.push(target);
            }
        }
        out
    }

    /// Direct predecessors through edges, covers and splits, ascending
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let mut preds: BTreeSet<NodeId> = BTreeSet::new();
        preds.extend(self.edges(None, Some(id)).into_iter().map(|e| e.source));
        preds.extend(self.covers(None, Some(id)).into_iter().map(|c| c.source));
        preds.extend(self.split_sources_of(id));
        preds.into_iter().collect()
    }

    /// Nodes without successors, ascending
    pub fn leaves(&self) -> Vec<NodeId> {
        self.nodes
            .keys()
            .copied()
            .filter(|&id| self.successors(id).is_empty())
            .collect()
    }

    /// Every node reachable from `from`, including itself
    pub fn reachable(&self, from: NodeId) -> Result<BTreeSet<NodeId>> {
        self.node(from)?;
        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        queue.push_back(from);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for succ in self.successors(id) {
                if !seen.contains(&succ) {
                    queue.push_back(succ);
                }
            }
        }
        Ok(seen)
    }

    fn check_reference(&self, context: &str, id: NodeId) -> Result<()> {
        if self.nodes.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::invalid_reference(context, id))
        }
    }
}
