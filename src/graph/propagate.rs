//! # Split Constraint Propagation
//!
//! Every split target records the path condition of its branch:
//!
//! ```text
//! target.constraints = source.constraints ++ split.csubst.constraints ++ guard.constraints
//! ```
//!
//! Splits are visited in topological order of the split relation so a chain
//! of splits composes. Nothing is deduplicated, so the lists are exactly
//! reproducible and running the pass twice changes nothing.

use super::{NodeId, ProofGraph};
use crate::cterm::Formula;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

impl ProofGraph {
    /// Recompute the constraints of every split target
    ///
    /// Returns the number of nodes whose constraint list changed. A target
    /// of several splits (only produced by overlapping merges) takes its
    /// path condition from the split with the lowest source id.
    pub fn propagate_split_constraints(&mut self) -> Result<usize> {
        let order = self.split_topo_order()?;
        let mut changed = 0;

        for source in order {
            let Some(split) = self.splits.get(&source) else {
                continue;
            };
            let Some(source_node) = self.nodes.get(&source) else {
                return Err(Error::node_not_found(source));
            };

            let mut prefix: Vec<Formula> = source_node.cterm.constraints.clone();
            prefix.extend(split.csubst.constraints.iter().cloned());

            let mut updates: Vec<(NodeId, Vec<Formula>)> = Vec::new();
            for (&target, guard) in &split.targets {
                if self.split_sources_of(target).first() != Some(&source) {
                    continue;
                }
                let mut constraints = prefix.clone();
                constraints.extend(guard.constraints.iter().cloned());
                updates.push((target, constraints));
            }

            for (target, constraints) in updates {
                let node = self
                    .nodes
                    .get_mut(&target)
                    .ok_or_else(|| Error::node_not_found(target))?;
                if node.cterm.constraints != constraints {
                    node.cterm.constraints = constraints;
                    changed += 1;
                }
            }
        }

        tracing::debug!(
            splits = self.splits.len(),
            changed,
            "propagated split constraints"
        );
        Ok(changed)
    }

    /// Split sources ordered so every split comes after the splits leading
    /// into its source
    fn split_topo_order(&self) -> Result<Vec<NodeId>> {
        let mut in_degree: BTreeMap<NodeId, usize> = BTreeMap::new();
        for split in self.splits.values() {
            in_degree.entry(split.source).or_insert(0);
            for &target in split.targets.keys() {
                *in_degree.entry(target).or_insert(0) += 1;
            }
        }

        let mut ready: BTreeSet<NodeId> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let total = in_degree.len();
        let mut visited = 0;
        let mut order = Vec::new();

        while let Some(id) = ready.pop_first() {
            visited += 1;
            if let Some(split) = self.splits.get(&id) {
                order.push(id);
                for &target in split.targets.keys() {
                    if let Some(d) = in_degree.get_mut(&target) {
                        *d -= 1;
                        if *d == 0 {
                            ready.insert(target);
                        }
                    }
                }
            }
        }

        if visited < total {
            return Err(Error::conflict("splits form a cycle"));
        }
        Ok(order)
    }
}
