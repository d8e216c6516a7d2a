//! Mergeability oracles
//!
//! The merge engine knows nothing about when two states are equivalent;
//! the verification domain answers that through [`MergeOracle`].

use crate::cterm::{term, CSubst, CTerm};
use crate::error::Result;

/// Domain predicate deciding whether two configurations may share a path
///
/// The relation is treated as symmetric but not transitive. It is never
/// asked about a node paired with itself. Answers must be deterministic and
/// free of side effects for the duration of one merge.
pub trait MergeOracle: Sync {
    /// Whether `c1` and `c2` may be merged
    fn is_mergeable(&self, c1: &CTerm, c2: &CTerm) -> Result<bool>;

    /// Guard for a merged group that covers only part of a split
    ///
    /// Receives each member's branch guard (shared substitution included)
    /// in member order. The default is the disjunction of their
    /// constraints; domains with a simplifier can return something tighter.
    fn merge_guards(&self, guards: &[CSubst]) -> Result<CSubst> {
        let disjunction = term::or(guards.iter().map(CSubst::constraint).collect());
        Ok(CSubst::from_constraints(vec![disjunction]))
    }
}

impl<T: MergeOracle + ?Sized> MergeOracle for &T {
    fn is_mergeable(&self, c1: &CTerm, c2: &CTerm) -> Result<bool> {
        (**self).is_mergeable(c1, c2)
    }

    fn merge_guards(&self, guards: &[CSubst]) -> Result<CSubst> {
        (**self).merge_guards(guards)
    }
}

/// Every pair is mergeable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysMergeable;

impl MergeOracle for AlwaysMergeable {
    fn is_mergeable(&self, _c1: &CTerm, _c2: &CTerm) -> Result<bool> {
        Ok(true)
    }
}

/// No pair is mergeable
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverMergeable;

impl MergeOracle for NeverMergeable {
    fn is_mergeable(&self, _c1: &CTerm, _c2: &CTerm) -> Result<bool> {
        Ok(false)
    }
}

/// Oracle backed by a closure
pub struct FnOracle<F>(pub F);

impl<F> MergeOracle for FnOracle<F>
where
    F: Fn(&CTerm, &CTerm) -> bool + Sync,
{
    fn is_mergeable(&self, c1: &CTerm, c2: &CTerm) -> Result<bool> {
        Ok((self.0)(c1, c2))
    }
}
