//! # Node Merging
//!
//! Collapses structurally parallel, semantically equivalent branches of a
//! case split back into one path.
//!
//! ## Shape
//!
//! A split qualifies when each branch target has exactly one outgoing edge
//! (and nothing else), is the target of no other split, and that edge leads
//! outside the split. For such a split the oracle is asked about every pair
//! of branch targets and the maximal cliques of the answer are merged:
//!
//! ```text
//! before:                               after (one clique covers all):
//!
//!   S -|g1|-> n1 --e1--> t1               S --[G1,e1..,G2,e2..]--> M -|g1|-> t1
//!     -|g2|-> n2 --e2--> t2                                          -|g2|-> t2
//! ```
//!
//! `Gi` is a guard step holding the shared substitution extended with `gi`.
//! When the cliques cover only part of the split, or overlap, every clique
//! gets its own anchor node `A` hanging off `S` with the guard returned by
//! [`MergeOracle::merge_guards`], and the chain becomes `A --> M -|..|-> ..`.
//! A node in two cliques is merged into both.
//!
//! ## Rounds
//!
//! One round discovers cliques for every qualifying split, applies them in
//! ascending source order and re-propagates split constraints. Rounds repeat
//! until nothing merges, bounded by [`MergeOptions::max_rounds`]. Oracle
//! answers are kept for the whole run, so a pair of branches that survives a
//! round is not asked about again.
//!
//! Each split is applied atomically; rounds already applied stay applied if
//! a later round fails.

pub mod clique;
pub mod oracle;

pub use clique::MergeabilityGraph;
pub use oracle::{AlwaysMergeable, FnOracle, MergeOracle, NeverMergeable};

use crate::cterm::{CSubst, CTerm};
use crate::error::{Error, Result};
use crate::graph::{EdgeStep, NodeId, ProofGraph, Split};
use std::collections::BTreeMap;

/// Merge options
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Upper bound on discovery/apply rounds
    pub max_rounds: usize,
    /// Discover cliques of different splits on the rayon pool
    pub parallel: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            max_rounds: 64,
            parallel: true,
        }
    }
}

/// One merged clique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    /// Source of the split the members branched from
    pub split_source: NodeId,
    /// Merged branch targets, ascending
    pub members: Vec<NodeId>,
    /// Start of the merged edge: the split source, or a fresh anchor
    pub anchor: NodeId,
    /// Fresh node the merged edge leads to
    pub merged: NodeId,
    /// Distinct targets of the members' edges, now split out of `merged`
    pub targets: Vec<NodeId>,
}

/// Outcome of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Rounds that merged something
    pub rounds: usize,
    /// Groups in the order they were applied
    pub groups: Vec<MergeGroup>,
    /// Oracle queries issued; a pair is asked at most once per run
    pub oracle_calls: usize,
}

impl MergeReport {
    /// Returns true if nothing was merged
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// A branch target of a qualifying split with its single outgoing edge
#[derive(Debug, Clone, PartialEq, Eq)]
struct Branch {
    node: NodeId,
    cterm: CTerm,
    guard: CSubst,
    steps: Vec<EdgeStep>,
    target: NodeId,
}

/// Snapshot of a qualifying split
#[derive(Debug, Clone, PartialEq, Eq)]
struct BranchSet {
    source: NodeId,
    shared: CSubst,
    branches: Vec<Branch>,
}

impl BranchSet {
    fn branch(&self, id: NodeId) -> Result<&Branch> {
        self.branches
            .iter()
            .find(|b| b.node == id)
            .ok_or_else(|| Error::node_not_found(id))
    }
}

/// Oracle answers keyed by `(smaller id, larger id)`
type Answers = BTreeMap<(NodeId, NodeId), bool>;

/// Cliques found for one split
#[derive(Debug, Clone)]
struct MergePlan {
    set: BranchSet,
    cliques: Vec<Vec<NodeId>>,
    /// Answers the oracle gave while this plan was built
    asked: Vec<((NodeId, NodeId), bool)>,
}

/// Oracle-driven branch merger
pub struct NodeMerger {
    options: MergeOptions,
}

impl NodeMerger {
    /// Create a merger with options
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    /// Merge until no qualifying split yields a clique of two or more
    pub fn run<O: MergeOracle + ?Sized>(
        &self,
        graph: &mut ProofGraph,
        oracle: &O,
    ) -> Result<MergeReport> {
        let mut report = MergeReport::default();
        let mut answers = Answers::new();

        for _ in 0..self.options.max_rounds {
            let sets = graph.qualifying_splits();
            let plans = self.discover(sets, oracle, &answers)?;
            for plan in &plans {
                report.oracle_calls += plan.asked.len();
                answers.extend(plan.asked.iter().copied());
            }

            let plans: Vec<MergePlan> = plans.into_iter().filter(|p| !p.cliques.is_empty()).collect();
            if plans.is_empty() {
                tracing::debug!(rounds = report.rounds, groups = report.groups.len(), "merge finished");
                return Ok(report);
            }

            let mut merged_any = false;
            for plan in plans {
                // an earlier plan of this round may have reshaped this split
                if graph.branch_set(plan.set.source).as_ref() != Some(&plan.set) {
                    tracing::debug!(split = %plan.set.source, "split changed during round, deferring");
                    continue;
                }
                let groups = graph.apply_plan(&plan, oracle)?;
                merged_any |= !groups.is_empty();
                report.groups.extend(groups);
            }

            graph.propagate_split_constraints()?;
            if !merged_any {
                return Ok(report);
            }
            report.rounds += 1;
        }

        tracing::warn!(
            max_rounds = self.options.max_rounds,
            groups = report.groups.len(),
            "merge stopped at round limit"
        );
        Ok(report)
    }

    fn discover<O: MergeOracle + ?Sized>(
        &self,
        sets: Vec<BranchSet>,
        oracle: &O,
        answers: &Answers,
    ) -> Result<Vec<MergePlan>> {
        #[cfg(feature = "parallel")]
        if self.options.parallel && sets.len() > 1 {
            use rayon::prelude::*;
            return sets
                .into_par_iter()
                .map(|set| find_cliques(set, oracle, answers))
                .collect();
        }

        sets.into_iter()
            .map(|set| find_cliques(set, oracle, answers))
            .collect()
    }
}

/// Decide every unordered pair of branch targets, asking the oracle only
/// about pairs not already in `answers`, and return the maximal cliques of
/// size two or more
fn find_cliques<O: MergeOracle + ?Sized>(
    set: BranchSet,
    oracle: &O,
    answers: &Answers,
) -> Result<MergePlan> {
    let mut graph = MergeabilityGraph::new(set.branches.iter().map(|b| b.node));
    let mut asked = Vec::new();
    for (i, a) in set.branches.iter().enumerate() {
        for b in &set.branches[i + 1..] {
            let key = (a.node.min(b.node), a.node.max(b.node));
            let mergeable = match answers.get(&key) {
                Some(&known) => known,
                None => {
                    let answer = oracle.is_mergeable(&a.cterm, &b.cterm)?;
                    asked.push((key, answer));
                    answer
                }
            };
            if mergeable {
                graph.add_edge(a.node, b.node);
            }
        }
    }

    let cliques = graph.maximal_cliques(2);
    tracing::debug!(
        split = %set.source,
        branches = set.branches.len(),
        mergeable_pairs = graph.edge_count(),
        cliques = cliques.len(),
        "mergeability graph built"
    );
    Ok(MergePlan {
        set,
        cliques,
        asked,
    })
}

impl ProofGraph {
    /// Merge equivalent branches with default options
    ///
    /// See [`NodeMerger::run`].
    pub fn merge_nodes<O: MergeOracle + ?Sized>(&mut self, oracle: &O) -> Result<MergeReport> {
        NodeMerger::new(MergeOptions::default()).run(self, oracle)
    }

    /// Snapshots of every qualifying split, ascending source
    fn qualifying_splits(&self) -> Vec<BranchSet> {
        self.splits(None, None)
            .into_iter()
            .filter_map(|s| self.branch_set(s.source))
            .collect()
    }

    /// Snapshot of the split out of `source` if it qualifies for merging
    fn branch_set(&self, source: NodeId) -> Option<BranchSet> {
        let split = self.split(source)?;
        if split.targets.len() < 2 {
            return None;
        }

        let mut branches = Vec::with_capacity(split.targets.len());
        for (&node_id, guard) in &split.targets {
            if self.split_sources_of(node_id) != [source] {
                return None;
            }
            if self.split(node_id).is_some() || !self.covers(Some(node_id), None).is_empty() {
                return None;
            }
            let edges = self.edges(Some(node_id), None);
            let [edge] = edges.as_slice() else {
                return None;
            };
            if edge.target == source || split.targets.contains_key(&edge.target) {
                return None;
            }
            branches.push(Branch {
                node: node_id,
                cterm: self.get_node(node_id)?.cterm.clone(),
                guard: guard.clone(),
                steps: edge.steps.clone(),
                target: edge.target,
            });
        }

        Some(BranchSet {
            source,
            shared: split.csubst.clone(),
            branches,
        })
    }

    /// Rewrite one split according to its cliques
    ///
    /// Everything fallible that does not touch the graph (member lookup,
    /// oracle guards) runs before the first mutation.
    fn apply_plan<O: MergeOracle + ?Sized>(
        &mut self,
        plan: &MergePlan,
        oracle: &O,
    ) -> Result<Vec<MergeGroup>> {
        let set = &plan.set;
        let source_cterm = self.node(set.source)?.cterm.clone();
        let covers_split = plan.cliques.len() == 1 && plan.cliques[0].len() == set.branches.len();

        struct Prepared {
            members: Vec<NodeId>,
            steps: Vec<EdgeStep>,
            targets: BTreeMap<NodeId, CSubst>,
            anchor_guard: Option<CSubst>,
        }

        let mut prepared = Vec::with_capacity(plan.cliques.len());
        for clique in &plan.cliques {
            let mut steps = Vec::new();
            let mut targets: BTreeMap<NodeId, CSubst> = BTreeMap::new();
            let mut guards = Vec::with_capacity(clique.len());
            for &member in clique {
                let branch = set.branch(member)?;
                let guard = set.shared.extend(&branch.guard);
                steps.push(EdgeStep::guard(guard.clone()));
                steps.extend(branch.steps.iter().cloned());
                targets
                    .entry(branch.target)
                    .or_insert_with(|| branch.guard.clone());
                guards.push(guard);
            }
            let anchor_guard = if covers_split {
                None
            } else {
                Some(oracle.merge_guards(&guards)?)
            };
            prepared.push(Prepared {
                members: clique.clone(),
                steps,
                targets,
                anchor_guard,
            });
        }

        let mut groups = Vec::with_capacity(prepared.len());
        let mut anchors: BTreeMap<NodeId, CSubst> = BTreeMap::new();

        if covers_split {
            let Some(group) = prepared.into_iter().next() else {
                return Ok(groups);
            };
            for &member in &group.members {
                self.detach_node(member)?;
            }
            let merged = self.add_node(source_cterm).id;
            self.create_edge(set.source, merged, group.steps)?;
            self.attach_merged_split(merged, group.targets.clone(), set.shared.clone())?;
            groups.push(MergeGroup {
                split_source: set.source,
                members: group.members,
                anchor: set.source,
                merged,
                targets: group.targets.keys().copied().collect(),
            });
        } else {
            for group in prepared {
                let anchor_guard = group.anchor_guard.unwrap_or_default();
                let anchor_cterm = source_cterm.clone().add_constraints(
                    set.shared
                        .constraints
                        .iter()
                        .chain(anchor_guard.constraints.iter())
                        .cloned(),
                );
                let anchor = self.add_node(anchor_cterm.clone()).id;
                let merged = self.add_node(anchor_cterm).id;
                self.create_edge(anchor, merged, group.steps)?;
                self.attach_merged_split(merged, group.targets.clone(), set.shared.clone())?;
                anchors.insert(anchor, anchor_guard);
                groups.push(MergeGroup {
                    split_source: set.source,
                    members: group.members,
                    anchor,
                    merged,
                    targets: group.targets.keys().copied().collect(),
                });
            }

            let mut members: Vec<NodeId> = groups.iter().flat_map(|g| g.members.clone()).collect();
            members.sort();
            members.dedup();
            for member in members {
                self.detach_node(member)?;
            }

            let mut targets = self
                .detach_split(set.source)
                .map(|s| s.targets)
                .unwrap_or_default();
            targets.extend(anchors);
            self.attach_split(
                Split {
                    source: set.source,
                    csubst: set.shared.clone(),
                    targets,
                },
                true,
            )?;
        }

        for group in &groups {
            tracing::debug!(
                split = %group.split_source,
                members = ?group.members,
                anchor = %group.anchor,
                merged = %group.merged,
                "merged branch group"
            );
        }
        Ok(groups)
    }

    fn attach_merged_split(
        &mut self,
        source: NodeId,
        targets: BTreeMap<NodeId, CSubst>,
        shared: CSubst,
    ) -> Result<()> {
        self.attach_split(
            Split {
                source,
                csubst: shared,
                targets,
            },
            true,
        )
    }
}
