//! Constrained substitutions

use super::term::{self, Formula, Term};
use super::CTerm;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A substitution together with extra path-condition formulas
///
/// Read as "apply `subst` AND assume `constraints`". This is the effect of
/// one transition in the graph: an edge step, a split branch or a cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CSubst {
    /// Variable bindings, unique keys
    #[serde(default)]
    pub subst: BTreeMap<String, Term>,
    /// Assumed formulas, in insertion order
    #[serde(default)]
    pub constraints: Vec<Formula>,
}

impl CSubst {
    /// Create a constrained substitution
    pub fn new(subst: BTreeMap<String, Term>, constraints: Vec<Formula>) -> Self {
        Self { subst, constraints }
    }

    /// The identity substitution without constraints
    pub fn top() -> Self {
        Self::default()
    }

    /// Pure constraint, no bindings
    pub fn from_constraints(constraints: Vec<Formula>) -> Self {
        Self {
            subst: BTreeMap::new(),
            constraints,
        }
    }

    /// Single binding `name ↦ value`
    pub fn binding(name: impl Into<String>, value: Term) -> Self {
        let mut subst = BTreeMap::new();
        subst.insert(name.into(), value);
        Self {
            subst,
            constraints: Vec::new(),
        }
    }

    /// Append one constraint
    pub fn add_constraint(mut self, constraint: Formula) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// True when there are no bindings and no constraints
    pub fn is_top(&self) -> bool {
        self.subst.is_empty() && self.constraints.is_empty()
    }

    /// All constraints as one conjunction (`#Top` when empty)
    pub fn constraint(&self) -> Formula {
        term::and(self.constraints.clone())
    }

    /// Apply to a configuration: substitute its term and constraints, then
    /// append this substitution's own constraints
    pub fn apply(&self, cterm: &CTerm) -> CTerm {
        let term = cterm.term.substitute(&self.subst);
        let mut constraints: Vec<Formula> = cterm
            .constraints
            .iter()
            .map(|c| c.substitute(&self.subst))
            .collect();
        constraints.extend(self.constraints.iter().cloned());
        CTerm::new(term, constraints)
    }

    /// Sequential composition: `other` first, then `self`
    ///
    /// Bindings of `other` are rewritten through `self`; bindings of `self`
    /// on variables `other` leaves free are kept. Constraints are
    /// `other.constraints` (rewritten through `self`) followed by
    /// `self.constraints`.
    pub fn compose(&self, other: &CSubst) -> CSubst {
        let mut subst: BTreeMap<String, Term> = other
            .subst
            .iter()
            .map(|(k, v)| (k.clone(), v.substitute(&self.subst)))
            .collect();
        for (k, v) in &self.subst {
            subst.entry(k.clone()).or_insert_with(|| v.clone());
        }
        let mut constraints: Vec<Formula> = other
            .constraints
            .iter()
            .map(|c| c.substitute(&self.subst))
            .collect();
        constraints.extend(self.constraints.iter().cloned());
        CSubst { subst, constraints }
    }

    /// Union without rewriting: bindings of `other` win on clashes,
    /// constraints are `self ++ other`
    ///
    /// Used to combine a split's shared substitution with one branch guard.
    pub fn extend(&self, other: &CSubst) -> CSubst {
        let mut subst = self.subst.clone();
        for (k, v) in &other.subst {
            subst.insert(k.clone(), v.clone());
        }
        let mut constraints = self.constraints.clone();
        constraints.extend(other.constraints.iter().cloned());
        CSubst { subst, constraints }
    }
}

impl fmt::Display for CSubst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_top() {
            return write!(f, "#Top");
        }
        let bindings: Vec<String> = self
            .subst
            .iter()
            .map(|(k, v)| format!("{} <- {}", k, v))
            .collect();
        match (bindings.is_empty(), self.constraints.is_empty()) {
            (false, true) => write!(f, "{{{}}}", bindings.join(", ")),
            (true, false) => write!(f, "{}", self.constraint()),
            _ => write!(f, "{{{}}} #And {}", bindings.join(", "), self.constraint()),
        }
    }
}
