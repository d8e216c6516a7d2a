//! # Merge Scenario Tests
//!
//! A root splits four ways on integer ranges of `X`; each branch runs one
//! (possibly multi-step) edge to its own terminal node:
//!
//! ```text
//! 1 -|X >=Int 5|->            2 -(5, r1, #Top)->                         6
//!   -|X >=Int 3 & X <Int 5|-> 3 -(10, r2 r3, X in [4,5)) (15, r4, X in [3,4))-> 7
//!   -|X >=Int 0 & X <Int 3|-> 4 -(20, r5, #Top)->                        8
//!   -|X <Int 0|->             5 -(25, r6, #Top)->                        9
//! ```

use proofgraph::cterm::term::{and, equals_true, ge_int, lt_int};
use proofgraph::{
    AlwaysMergeable, CSubst, CTerm, EdgeStep, Error, FnOracle, Formula, MergeOptions,
    MergeOracle, NeverMergeable, NodeId, NodeMerger, ProofGraph, Result, Term,
};
use std::collections::BTreeMap;

// ====================
// Fixtures
// ====================

fn x() -> Term {
    Term::var("X")
}

fn x_ge(n: i64) -> Formula {
    equals_true(ge_int(x(), Term::int(n)))
}

fn x_lt(n: i64) -> Formula {
    equals_true(lt_int(x(), Term::int(n)))
}

fn x_ge_5() -> Formula {
    x_ge(5)
}

fn x_lt_5_ge_3() -> Formula {
    and(vec![x_ge(3), x_lt(5)])
}

fn x_lt_3_ge_0() -> Formula {
    and(vec![x_ge(0), x_lt(3)])
}

fn x_lt_0() -> Formula {
    x_lt(0)
}

fn x_lt_5_ge_4() -> Formula {
    and(vec![x_ge(4), x_lt(5)])
}

fn x_lt_4_ge_3() -> Formula {
    and(vec![x_ge(3), x_lt(4)])
}

fn x_config() -> CTerm {
    CTerm::from_term(Term::apply("<k>", vec![x()]))
}

fn x_subst() -> CSubst {
    CSubst::binding("X", x())
}

fn guard(f: Formula) -> CSubst {
    CSubst::from_constraints(vec![f])
}

fn step(depth: u64, rules: &[&str], csubst: CSubst) -> EdgeStep {
    EdgeStep::new(depth, rules.iter().map(|r| r.to_string()).collect(), csubst)
}

fn range_guards() -> Vec<(u64, Formula)> {
    vec![
        (2, x_ge_5()),
        (3, x_lt_5_ge_3()),
        (4, x_lt_3_ge_0()),
        (5, x_lt_0()),
    ]
}

fn branch_steps() -> Vec<(u64, u64, Vec<EdgeStep>)> {
    vec![
        (2, 6, vec![step(5, &["r1"], CSubst::top())]),
        (
            3,
            7,
            vec![
                step(10, &["r2", "r3"], x_subst().add_constraint(x_lt_5_ge_4())),
                step(15, &["r4"], x_subst().add_constraint(x_lt_4_ge_3())),
            ],
        ),
        (4, 8, vec![step(20, &["r5"], CSubst::top())]),
        (5, 9, vec![step(25, &["r6"], CSubst::top())]),
    ]
}

fn range_split_graph() -> ProofGraph {
    let mut graph = ProofGraph::new();
    for _ in 1..=9 {
        graph.add_node(x_config());
    }
    let targets: BTreeMap<NodeId, CSubst> = range_guards()
        .into_iter()
        .map(|(id, f)| (NodeId(id), guard(f)))
        .collect();
    graph
        .create_split(NodeId(1), targets, x_subst())
        .expect("split");
    for (source, target, steps) in branch_steps() {
        graph
            .create_edge(NodeId(source), NodeId(target), steps)
            .expect("edge");
    }
    graph
}

/// Oracle: nodes whose first constraint lies in `X >= 0` are mergeable with
/// each other, and so are nodes in `X < 5`
struct RangeOracle;

impl RangeOracle {
    fn in_ge_0(c: &CTerm) -> bool {
        let first = &c.constraints[0];
        *first == x_ge_5() || *first == x_lt_5_ge_3() || *first == x_lt_3_ge_0()
    }

    fn in_lt_5(c: &CTerm) -> bool {
        let first = &c.constraints[0];
        *first == x_lt_0() || *first == x_lt_3_ge_0() || *first == x_lt_5_ge_3()
    }
}

impl MergeOracle for RangeOracle {
    fn is_mergeable(&self, c1: &CTerm, c2: &CTerm) -> Result<bool> {
        if c1.constraints.is_empty() || c2.constraints.is_empty() {
            return Ok(false);
        }
        Ok((Self::in_ge_0(c1) && Self::in_ge_0(c2)) || (Self::in_lt_5(c1) && Self::in_lt_5(c2)))
    }

    fn merge_guards(&self, guards: &[CSubst]) -> Result<CSubst> {
        let covers_ge_5 = guards.iter().any(|g| g.constraints.contains(&x_ge_5()));
        Ok(if covers_ge_5 {
            guard(x_ge(0))
        } else {
            guard(x_lt(5))
        })
    }
}

// ====================
// Always mergeable
// ====================

#[test]
fn test_always_mergeable_collapses_split() {
    let mut graph = range_split_graph();
    let report = graph.merge_nodes(&AlwaysMergeable).unwrap();

    // expected: 1 -> 10 -|split|-> 6 7 8 9
    let mut expected = ProofGraph::new();
    for _ in 1..=10 {
        expected.add_node(x_config());
    }
    for id in 2..=5 {
        expected.remove_node(NodeId(id)).unwrap();
    }
    let mut merged_steps = Vec::new();
    for ((_, f), (_, _, steps)) in range_guards().into_iter().zip(branch_steps()) {
        merged_steps.push(EdgeStep::guard(x_subst().add_constraint(f)));
        merged_steps.extend(steps);
    }
    expected
        .create_edge(NodeId(1), NodeId(10), merged_steps)
        .unwrap();
    let end_targets: BTreeMap<NodeId, CSubst> = range_guards()
        .into_iter()
        .zip(6..=9)
        .map(|((_, f), t)| (NodeId(t), guard(f)))
        .collect();
    expected
        .create_split(NodeId(10), end_targets, x_subst())
        .unwrap();

    assert_eq!(graph.to_dict(), expected.to_dict());
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.rounds, 1);
    // 4 branches, 6 unordered pairs, never a self-pair
    assert_eq!(report.oracle_calls, 6);

    let group = &report.groups[0];
    assert_eq!(group.members, vec![NodeId(2), NodeId(3), NodeId(4), NodeId(5)]);
    assert_eq!(group.anchor, NodeId(1));
    assert_eq!(group.merged, NodeId(10));
}

#[test]
fn test_merged_targets_get_branch_constraints() {
    let mut graph = range_split_graph();
    graph.merge_nodes(&AlwaysMergeable).unwrap();

    for ((_, f), target) in range_guards().into_iter().zip(6..=9) {
        let node = graph.get_node(NodeId(target)).unwrap();
        assert_eq!(node.cterm.constraints, vec![f]);
    }
}

// ====================
// Overlapping cliques
// ====================

#[test]
fn test_overlapping_cliques_merge_twice() {
    let mut graph = range_split_graph();
    let report = graph.merge_nodes(&RangeOracle).unwrap();

    assert_eq!(report.groups.len(), 2);
    assert_eq!(
        report.groups[0].members,
        vec![NodeId(2), NodeId(3), NodeId(4)]
    );
    assert_eq!(
        report.groups[1].members,
        vec![NodeId(3), NodeId(4), NodeId(5)]
    );

    let root_split = graph.split(NodeId(1)).unwrap();
    assert_eq!(root_split.targets.len(), 2);

    for (&anchor, branch_guard) in &root_split.targets {
        let constraints = &branch_guard.constraints;
        assert_eq!(constraints.len(), 1);
        let edges = graph.edges(Some(anchor), None);
        assert_eq!(edges.len(), 1);
        let edge = edges[0];
        let end_split = graph.split(edge.target).unwrap();

        if constraints[0] == x_ge(0) {
            assert!(edge.steps.contains(&step(5, &["r1"], CSubst::top())));
            assert!(edge
                .steps
                .contains(&step(10, &["r2", "r3"], x_subst().add_constraint(x_lt_5_ge_4()))));
            assert!(edge
                .steps
                .contains(&step(15, &["r4"], x_subst().add_constraint(x_lt_4_ge_3()))));
            assert!(edge.steps.contains(&step(20, &["r5"], CSubst::top())));
            assert_eq!(end_split.guard(NodeId(6)), Some(&guard(x_ge_5())));
            assert_eq!(end_split.guard(NodeId(7)), Some(&guard(x_lt_5_ge_3())));
            assert_eq!(end_split.guard(NodeId(8)), Some(&guard(x_lt_3_ge_0())));
            assert_eq!(end_split.targets.len(), 3);
        } else if constraints[0] == x_lt(5) {
            assert!(edge
                .steps
                .contains(&step(10, &["r2", "r3"], x_subst().add_constraint(x_lt_5_ge_4()))));
            assert!(edge
                .steps
                .contains(&step(15, &["r4"], x_subst().add_constraint(x_lt_4_ge_3()))));
            assert!(edge.steps.contains(&step(20, &["r5"], CSubst::top())));
            assert!(edge.steps.contains(&step(25, &["r6"], CSubst::top())));
            assert_eq!(end_split.guard(NodeId(7)), Some(&guard(x_lt_5_ge_3())));
            assert_eq!(end_split.guard(NodeId(8)), Some(&guard(x_lt_3_ge_0())));
            assert_eq!(end_split.guard(NodeId(9)), Some(&guard(x_lt_0())));
            assert_eq!(end_split.targets.len(), 3);
        } else {
            panic!("unexpected anchor guard {:?}", constraints);
        }
    }

    // nodes 3 and 4 were absorbed into both groups
    for id in 2..=5 {
        assert!(graph.get_node(NodeId(id)).is_none());
    }
}

#[test]
fn test_anchor_cterm_matches_propagation() {
    let mut graph = range_split_graph();
    let report = graph.merge_nodes(&RangeOracle).unwrap();

    let before = graph.clone();
    assert_eq!(graph.propagate_split_constraints().unwrap(), 0);
    assert_eq!(graph, before);

    let anchor = graph.get_node(report.groups[0].anchor).unwrap();
    assert_eq!(anchor.cterm.constraints, vec![x_ge(0)]);
}

// ====================
// No spurious merges
// ====================

#[test]
fn test_never_mergeable_keeps_graph() {
    let mut graph = range_split_graph();
    let before = graph.to_dict();
    let report = graph.merge_nodes(&NeverMergeable).unwrap();
    assert!(report.is_empty());
    assert_eq!(graph.to_dict(), before);
}

#[test]
fn test_partial_clique_leaves_other_branches() {
    // only 4 and 5 are mergeable
    let oracle = proofgraph::FnOracle(|a: &CTerm, b: &CTerm| {
        let low = |c: &CTerm| c.constraints.first() == Some(&x_lt_3_ge_0()) || c.constraints.first() == Some(&x_lt_0());
        low(a) && low(b)
    });

    let mut graph = range_split_graph();
    let report = graph.merge_nodes(&oracle).unwrap();
    assert_eq!(report.groups.len(), 1);
    let group = &report.groups[0];
    assert_eq!(group.members, vec![NodeId(4), NodeId(5)]);
    assert_eq!(group.targets, vec![NodeId(8), NodeId(9)]);

    let root_split = graph.split(NodeId(1)).unwrap();
    assert_eq!(
        root_split.target_ids(),
        vec![NodeId(2), NodeId(3), group.anchor]
    );
    let anchor_guard = root_split.guard(group.anchor).unwrap();
    assert_eq!(
        anchor_guard.constraint(),
        proofgraph::cterm::term::or(vec![x_lt_3_ge_0(), x_lt_0()])
    );
}

// ====================
// Reachability and errors
// ====================

#[test]
fn test_reachability_preserved() {
    for oracle in [
        &AlwaysMergeable as &dyn MergeOracle,
        &RangeOracle as &dyn MergeOracle,
        &NeverMergeable as &dyn MergeOracle,
    ] {
        let mut graph = range_split_graph();
        graph.merge_nodes(oracle).unwrap();
        let reachable = graph.reachable(NodeId(1)).unwrap();
        for terminal in 6..=9 {
            assert!(reachable.contains(&NodeId(terminal)));
        }
        assert_eq!(graph.leaves(), vec![NodeId(6), NodeId(7), NodeId(8), NodeId(9)]);
    }
}

#[test]
fn test_merge_result_round_trips() {
    let mut graph = range_split_graph();
    graph.merge_nodes(&RangeOracle).unwrap();
    let json = graph.to_json().unwrap();
    let restored = ProofGraph::from_json(&json).unwrap();
    assert_eq!(restored, graph);
}

#[test]
fn test_oracle_failure_keeps_earlier_rounds() {
    /// Agrees on `X` configurations, fails on anything else
    struct Flaky;
    impl MergeOracle for Flaky {
        fn is_mergeable(&self, c1: &CTerm, _c2: &CTerm) -> Result<bool> {
            if c1.term == x() {
                Ok(true)
            } else {
                Err(Error::oracle("second round"))
            }
        }
    }

    // Round 1 merges the `X` branches, round 2 asks about the `Y` split below
    let mut graph = ProofGraph::new();
    let ids: Vec<NodeId> = (0..7)
        .map(|i| {
            let term = if i == 3 || i == 4 { Term::var("Y") } else { x() };
            graph.add_node(CTerm::from_term(term)).id
        })
        .collect();
    let targets: BTreeMap<NodeId, CSubst> = [ids[1], ids[2]]
        .into_iter()
        .map(|id| (id, CSubst::top()))
        .collect();
    graph.create_split(ids[0], targets, CSubst::top()).unwrap();
    graph
        .create_edge(ids[1], ids[3], vec![step(1, &["a"], CSubst::top())])
        .unwrap();
    graph
        .create_edge(ids[2], ids[4], vec![step(1, &["b"], CSubst::top())])
        .unwrap();
    graph
        .create_edge(ids[3], ids[5], vec![step(2, &["c"], CSubst::top())])
        .unwrap();
    graph
        .create_edge(ids[4], ids[6], vec![step(2, &["d"], CSubst::top())])
        .unwrap();

    let err = graph.merge_nodes(&Flaky).unwrap_err();
    assert_eq!(err, Error::oracle("second round"));
    // first round stayed applied
    assert!(graph.get_node(ids[1]).is_none());
    assert!(graph.edge(ids[0], NodeId(8)).is_some());
}

// ====================
// Round control
// ====================

/// Root `1` splits into branches `2, 4, 6, 8` with terms L, L, H, H; branch
/// `n` runs one edge to terminal `n + 1`
fn two_kind_split() -> ProofGraph {
    let mut graph = ProofGraph::new();
    let root = graph.add_node(CTerm::from_term(Term::var("R"))).id;
    let mut targets = BTreeMap::new();
    for (i, name) in ["L", "L", "H", "H"].into_iter().enumerate() {
        let branch = graph.add_node(CTerm::from_term(Term::var(name))).id;
        let done = graph.add_node(CTerm::from_term(Term::int(i as i64))).id;
        graph
            .create_edge(branch, done, vec![step(1, &["r"], CSubst::top())])
            .unwrap();
        targets.insert(branch, CSubst::top());
    }
    graph.create_split(root, targets, CSubst::top()).unwrap();
    graph
}

fn same_term(a: &CTerm, b: &CTerm) -> bool {
    a.term == b.term
}

#[test]
fn test_anchors_merge_in_second_round() {
    let mut graph = two_kind_split();
    let report = graph.merge_nodes(&FnOracle(same_term)).unwrap();

    // round 1: {2, 4} and {6, 8} behind anchors; round 2: the two anchors,
    // both copies of the root, collapse the root split
    assert_eq!(report.rounds, 2);
    assert_eq!(report.groups.len(), 3);
    let last = &report.groups[2];
    assert_eq!(last.members, vec![report.groups[0].anchor, report.groups[1].anchor]);
    assert_eq!(last.anchor, NodeId(1));
    assert!(graph.split(NodeId(1)).is_none());
    assert_eq!(
        graph.split(last.merged).unwrap().target_ids(),
        vec![report.groups[0].merged, report.groups[1].merged]
    );
}

#[test]
fn test_round_limit_returns_partial_report() {
    let mut graph = two_kind_split();
    let merger = NodeMerger::new(MergeOptions {
        max_rounds: 1,
        ..MergeOptions::default()
    });
    let report = merger.run(&mut graph, &FnOracle(same_term)).unwrap();

    assert_eq!(report.rounds, 1);
    assert_eq!(report.oracle_calls, 6);
    let members: Vec<Vec<NodeId>> = report.groups.iter().map(|g| g.members.clone()).collect();
    assert_eq!(
        members,
        vec![vec![NodeId(2), NodeId(4)], vec![NodeId(6), NodeId(8)]]
    );

    // the anchors are left on the root split for a later run
    let anchors: Vec<NodeId> = report.groups.iter().map(|g| g.anchor).collect();
    assert_eq!(graph.split(NodeId(1)).unwrap().target_ids(), anchors);

    let rest = graph.merge_nodes(&FnOracle(same_term)).unwrap();
    assert_eq!(rest.groups.len(), 1);
    assert_eq!(rest.groups[0].members, anchors);
}

#[test]
fn test_plan_reshaped_by_earlier_merge_is_deferred() {
    // 1 -|..|-> 2 --> 5            4 -|..|-> 5 --> 7
    //      -|..|-> 3 --> 6                -|..|-> 6 --> 8
    let mut graph = ProofGraph::new();
    for _ in 1..=8 {
        graph.add_node(x_config());
    }
    let split = |a: u64, b: u64| -> BTreeMap<NodeId, CSubst> {
        [(NodeId(a), guard(x_ge(0))), (NodeId(b), guard(x_lt(0)))]
            .into_iter()
            .collect()
    };
    graph.create_split(NodeId(1), split(2, 3), CSubst::top()).unwrap();
    graph.create_split(NodeId(4), split(5, 6), CSubst::top()).unwrap();
    for (source, target) in [(2, 5), (3, 6), (5, 7), (6, 8)] {
        graph
            .create_edge(NodeId(source), NodeId(target), vec![step(1, &["r"], CSubst::top())])
            .unwrap();
    }

    let merger = NodeMerger::new(MergeOptions {
        parallel: false,
        ..MergeOptions::default()
    });
    let report = merger.run(&mut graph, &AlwaysMergeable).unwrap();

    // both splits were planned in round 1; merging split 1 made 5 and 6
    // targets of the new split too, so split 4 no longer qualified
    assert_eq!(report.oracle_calls, 2);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].split_source, NodeId(1));
    assert_eq!(report.groups[0].targets, vec![NodeId(5), NodeId(6)]);

    let untouched = graph.split(NodeId(4)).unwrap();
    assert_eq!(untouched.target_ids(), vec![NodeId(5), NodeId(6)]);
    assert!(graph.edge(NodeId(5), NodeId(7)).is_some());
    assert!(graph.edge(NodeId(6), NodeId(8)).is_some());
    assert_eq!(
        graph.split_sources_of(NodeId(5)),
        vec![NodeId(4), report.groups[0].merged]
    );
}
