//! # Constrained Terms
//!
//! A [`CTerm`] is one symbolic state of the explored program: a term plus
//! the path condition under which execution reaches it. A [`CSubst`] is the
//! effect of one transition between two such states.
//!
//! Comparisons in this layer are structural. Two constraint lists holding
//! the same formulas in a different order are different values, even though
//! they mean the same thing.

pub mod subst;
pub mod term;

pub use subst::CSubst;
pub use term::{Formula, Term};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A symbolic configuration: term and ordered path condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CTerm {
    /// Configuration term
    pub term: Term,
    /// Path condition, in insertion order
    #[serde(default)]
    pub constraints: Vec<Formula>,
}

impl CTerm {
    /// Create a configuration
    pub fn new(term: Term, constraints: Vec<Formula>) -> Self {
        Self { term, constraints }
    }

    /// Unconstrained configuration
    pub fn from_term(term: Term) -> Self {
        Self {
            term,
            constraints: Vec::new(),
        }
    }

    /// Append one constraint
    pub fn add_constraint(mut self, constraint: Formula) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Append constraints in order
    pub fn add_constraints(mut self, constraints: impl IntoIterator<Item = Formula>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Same term, replaced path condition
    pub fn with_constraints(&self, constraints: Vec<Formula>) -> Self {
        Self {
            term: self.term.clone(),
            constraints,
        }
    }

    /// The path condition as one conjunction (`#Top` when empty)
    pub fn constraint(&self) -> Formula {
        term::and(self.constraints.clone())
    }

    /// Variables of the term and the path condition
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = self.term.free_vars();
        for c in &self.constraints {
            vars.extend(c.free_vars());
        }
        vars
    }
}

impl fmt::Display for CTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "{}", self.term)
        } else {
            write!(f, "{} #And {}", self.term, self.constraint())
        }
    }
}
