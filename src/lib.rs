//! # proofgraph - Proof-State Graphs for Symbolic Execution
//!
//! A rewriting engine explores a program from an initial symbolic
//! configuration and records what it finds here: every reached state is a
//! node, every rewrite chain an edge, every branch on a condition a split.
//! The graph that remains is the artifact of the proof.
//!
//! Case splits multiply paths even when the branches end up equivalent.
//! [`ProofGraph::merge_nodes`] folds such branches back into one path,
//! using a domain-supplied [`MergeOracle`] to decide what "equivalent"
//! means, and [`ProofGraph::propagate_split_constraints`] keeps every
//! node's path condition in step with the splits above it.
//!
//! ## Quick Start
//!
//! ```rust
//! use proofgraph::cterm::term::{equals_true, ge_int, lt_int};
//! use proofgraph::{AlwaysMergeable, CSubst, CTerm, EdgeStep, ProofGraph, Term};
//! use std::collections::BTreeMap;
//!
//! # fn main() -> proofgraph::Result<()> {
//! let x = Term::var("X");
//! let mut graph = ProofGraph::new();
//!
//! let root = graph.add_node(CTerm::from_term(x.clone())).id;
//! let pos = graph.add_node(CTerm::from_term(x.clone())).id;
//! let neg = graph.add_node(CTerm::from_term(x.clone())).id;
//! let done_pos = graph.add_node(CTerm::from_term(Term::int(1))).id;
//! let done_neg = graph.add_node(CTerm::from_term(Term::int(0))).id;
//!
//! let mut branches = BTreeMap::new();
//! branches.insert(pos, CSubst::from_constraints(vec![equals_true(ge_int(x.clone(), Term::int(0)))]));
//! branches.insert(neg, CSubst::from_constraints(vec![equals_true(lt_int(x, Term::int(0)))]));
//! graph.create_split(root, branches, CSubst::top())?;
//!
//! graph.create_edge(pos, done_pos, vec![EdgeStep::new(3, vec!["pos".into()], CSubst::top())])?;
//! graph.create_edge(neg, done_neg, vec![EdgeStep::new(4, vec!["neg".into()], CSubst::top())])?;
//!
//! let report = graph.merge_nodes(&AlwaysMergeable)?;
//! let merged = report.groups[0].merged;
//!
//! // root -> merged -|X >=Int 0|-> done_pos
//! //                -|X <Int 0|->  done_neg
//! assert!(graph.edge(root, merged).is_some());
//! assert_eq!(graph.split(merged).unwrap().target_ids(), vec![done_pos, done_neg]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Main Components
//!
//! - [`Term`], [`CTerm`], [`CSubst`] - symbolic terms, configurations, transitions
//! - [`ProofGraph`] - node/edge/split/cover store with referential integrity
//! - [`MergeOracle`] - domain hook deciding mergeability
//! - [`NodeMerger`] - clique-based branch merging with [`MergeOptions`]
//! - [`GraphDict`] - ordered structured form for snapshots and fixtures
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result`]. Mutations validate before
//! they apply, so an `Err` from the store means the graph is unchanged.

pub mod cterm;
pub mod error;
pub mod graph;
pub mod merge;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export main types
pub use cterm::{CSubst, CTerm, Formula, Term};
pub use error::{Error, Result};
pub use graph::{Cover, Edge, EdgeStep, GraphDict, Node, NodeId, ProofGraph, Split};
pub use merge::{
    AlwaysMergeable, FnOracle, MergeGroup, MergeOptions, MergeOracle, MergeReport, NeverMergeable,
    NodeMerger,
};
