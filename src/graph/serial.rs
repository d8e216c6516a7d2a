//! # Structured Export / Import
//!
//! A plain, ordered image of a [`ProofGraph`] used for snapshots and test
//! fixtures. Every list is sorted by id (edges and covers by
//! `(source, target)`, split branches by target), so exporting the same
//! graph always yields the same value and the same JSON text.
//!
//! ```json
//! {
//!   "next": 4,
//!   "nodes":  [{"id": 1, "cterm": {...}}, ...],
//!   "edges":  [{"source": 2, "target": 3, "steps": [{"depth": 5, "rules": ["r1"], "csubst": {...}}]}],
//!   "splits": [{"source": 1, "csubst": {...}, "targets": [{"target": 2, "csubst": {...}}]}],
//!   "covers": []
//! }
//! ```

use super::{Edge, EdgeStep, NodeId, ProofGraph, Split, MAX_NODE_ID};
use crate::cterm::{CSubst, CTerm};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDict {
    /// Next id to hand out
    pub next: u64,
    /// Nodes, ascending id
    pub nodes: Vec<NodeDict>,
    /// Edges, ascending `(source, target)`
    #[serde(default)]
    pub edges: Vec<EdgeDict>,
    /// Splits, ascending source
    #[serde(default)]
    pub splits: Vec<SplitDict>,
    /// Covers, ascending `(source, target)`
    #[serde(default)]
    pub covers: Vec<CoverDict>,
}

/// Serialized node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDict {
    /// Node id
    pub id: NodeId,
    /// Configuration
    pub cterm: CTerm,
}

/// Serialized edge step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDict {
    /// Rewrite depth
    pub depth: u64,
    /// Rule labels
    #[serde(default)]
    pub rules: Vec<String>,
    /// Step substitution
    pub csubst: CSubst,
}

/// Serialized edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDict {
    /// Source node
    pub source: NodeId,
    /// Target node
    pub target: NodeId,
    /// Steps in order
    pub steps: Vec<StepDict>,
}

/// Serialized split branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitBranchDict {
    /// Branch target
    pub target: NodeId,
    /// Branch guard
    pub csubst: CSubst,
}

/// Serialized split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDict {
    /// Branching node
    pub source: NodeId,
    /// Shared substitution
    pub csubst: CSubst,
    /// Branches, ascending target
    pub targets: Vec<SplitBranchDict>,
}

/// Serialized cover
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverDict {
    /// Subsumed node
    pub source: NodeId,
    /// Subsuming node
    pub target: NodeId,
    /// Witness
    pub csubst: CSubst,
}

impl From<&EdgeStep> for StepDict {
    fn from(step: &EdgeStep) -> Self {
        StepDict {
            depth: step.depth,
            rules: step.rules.clone(),
            csubst: step.csubst.clone(),
        }
    }
}

impl From<StepDict> for EdgeStep {
    fn from(step: StepDict) -> Self {
        EdgeStep::new(step.depth, step.rules, step.csubst)
    }
}

impl From<&Edge> for EdgeDict {
    fn from(edge: &Edge) -> Self {
        EdgeDict {
            source: edge.source,
            target: edge.target,
            steps: edge.steps.iter().map(StepDict::from).collect(),
        }
    }
}

impl From<&Split> for SplitDict {
    fn from(split: &Split) -> Self {
        SplitDict {
            source: split.source,
            csubst: split.csubst.clone(),
            targets: split
                .targets
                .iter()
                .map(|(&target, csubst)| SplitBranchDict {
                    target,
                    csubst: csubst.clone(),
                })
                .collect(),
        }
    }
}

impl ProofGraph {
    /// Ordered structured image of the graph
    pub fn to_dict(&self) -> GraphDict {
        GraphDict {
            next: self.next,
            nodes: self
                .nodes
                .values()
                .map(|n| NodeDict {
                    id: n.id,
                    cterm: n.cterm.clone(),
                })
                .collect(),
            edges: self.edges.values().map(EdgeDict::from).collect(),
            splits: self.splits.values().map(SplitDict::from).collect(),
            covers: self
                .covers
                .values()
                .map(|c| CoverDict {
                    source: c.source,
                    target: c.target,
                    csubst: c.csubst.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a graph from its structured image
    ///
    /// Referential integrity and the structural invariants are checked as
    /// for ingestion, except that a node may be the target of several
    /// splits (merge results can look like that). Constraints are loaded as
    /// stored, without re-propagation.
    pub fn from_dict(dict: GraphDict) -> Result<Self> {
        if dict.next == 0 || dict.next > MAX_NODE_ID {
            return Err(Error::conflict(format!(
                "next id {} outside 1..={}",
                dict.next, MAX_NODE_ID
            )));
        }
        let mut graph = ProofGraph::new();
        graph.next = dict.next;

        for node in dict.nodes {
            if node.id.0 == 0 || node.id.0 >= dict.next {
                return Err(Error::conflict(format!(
                    "node id {} outside the allocated range 1..{}",
                    node.id, dict.next
                )));
            }
            if graph.nodes.contains_key(&node.id) {
                return Err(Error::conflict(format!("duplicate node id {}", node.id)));
            }
            graph.nodes.insert(
                node.id,
                super::Node {
                    id: node.id,
                    cterm: node.cterm,
                },
            );
        }

        for edge in dict.edges {
            let steps = edge.steps.into_iter().map(EdgeStep::from).collect();
            graph.create_edge(edge.source, edge.target, steps)?;
        }

        for cover in dict.covers {
            graph.create_cover(cover.source, cover.target, cover.csubst)?;
        }

        for split in dict.splits {
            let branch_count = split.targets.len();
            let targets: BTreeMap<NodeId, CSubst> = split
                .targets
                .into_iter()
                .map(|b| (b.target, b.csubst))
                .collect();
            if targets.len() != branch_count {
                return Err(Error::InvalidSplit {
                    message: format!("split from {} lists a target twice", split.source),
                });
            }
            graph.attach_split(
                Split {
                    source: split.source,
                    csubst: split.csubst,
                    targets,
                },
                true,
            )?;
        }

        tracing::debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            splits = graph.splits.len(),
            covers = graph.covers.len(),
            "imported graph"
        );
        Ok(graph)
    }

    /// Compact JSON snapshot
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_dict())?)
    }

    /// Indented JSON snapshot
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_dict())?)
    }

    /// Load a JSON snapshot
    pub fn from_json(json: &str) -> Result<Self> {
        let dict: GraphDict = serde_json::from_str(json)?;
        Self::from_dict(dict)
    }
}
