//! # Symbolic Terms
//!
//! Terms are the payload of every configuration and path condition in the
//! graph. This layer only needs structural equality, substitution and a
//! readable rendering; it never decides what a term means.
//!
//! Formulas are terms built from the matching-logic connectives below
//! (`#Top`, `#And`, `#Equals`, ...), so a path condition is a `Vec<Term>`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Label of the always-true formula
pub const TOP: &str = "#Top";
/// Label of the always-false formula
pub const BOTTOM: &str = "#Bottom";
/// Label of conjunction
pub const AND: &str = "#And";
/// Label of disjunction
pub const OR: &str = "#Or";
/// Label of negation
pub const NOT: &str = "#Not";
/// Label of the equality predicate
pub const EQUALS: &str = "#Equals";

/// A path-condition formula
pub type Formula = Term;

/// A symbolic term
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// Symbolic variable
    Variable {
        /// Variable name
        name: String,
    },
    /// Literal of some sort (`5:Int`, `true:Bool`)
    Token {
        /// Literal text
        token: String,
        /// Sort name
        sort: String,
    },
    /// Application of a labelled symbol
    Apply {
        /// Symbol label
        label: String,
        /// Arguments in order
        args: Vec<Term>,
    },
    /// Ordered sequence of terms (e.g. a continuation)
    Sequence {
        /// Items in order
        items: Vec<Term>,
    },
}

impl Term {
    /// Variable named `name`
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable { name: name.into() }
    }

    /// Token `token` of sort `sort`
    pub fn token(token: impl Into<String>, sort: impl Into<String>) -> Self {
        Term::Token {
            token: token.into(),
            sort: sort.into(),
        }
    }

    /// Integer literal
    pub fn int(value: i64) -> Self {
        Term::token(value.to_string(), "Int")
    }

    /// Boolean literal
    pub fn bool(value: bool) -> Self {
        Term::token(value.to_string(), "Bool")
    }

    /// Application of `label` to `args`
    pub fn apply(label: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Apply {
            label: label.into(),
            args,
        }
    }

    /// Sequence of items
    pub fn sequence(items: Vec<Term>) -> Self {
        Term::Sequence { items }
    }

    /// The always-true formula
    pub fn top() -> Self {
        Term::apply(TOP, Vec::new())
    }

    /// The always-false formula
    pub fn bottom() -> Self {
        Term::apply(BOTTOM, Vec::new())
    }

    /// Returns true for `#Top`
    pub fn is_top(&self) -> bool {
        matches!(self, Term::Apply { label, args } if label == TOP && args.is_empty())
    }

    /// Returns true for `#Bottom`
    pub fn is_bottom(&self) -> bool {
        matches!(self, Term::Apply { label, args } if label == BOTTOM && args.is_empty())
    }

    /// Label of an application, if this is one
    pub fn label(&self) -> Option<&str> {
        match self {
            Term::Apply { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Collect the names of all variables occurring in the term
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            Term::Variable { name } => {
                vars.insert(name.clone());
            }
            Term::Token { .. } => {}
            Term::Apply { args: items, .. } | Term::Sequence { items } => {
                for item in items {
                    item.collect_vars(vars);
                }
            }
        }
    }

    /// Replace every mapped variable by its image
    pub fn substitute(&self, subst: &BTreeMap<String, Term>) -> Term {
        if subst.is_empty() {
            return self.clone();
        }
        match self {
            Term::Variable { name } => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            Term::Token { .. } => self.clone(),
            Term::Apply { label, args } => Term::Apply {
                label: label.clone(),
                args: args.iter().map(|a| a.substitute(subst)).collect(),
            },
            Term::Sequence { items } => Term::Sequence {
                items: items.iter().map(|i| i.substitute(subst)).collect(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Formula builders
// ═══════════════════════════════════════════════════════════════════════════════

/// `#Equals(true, term)`: the boolean term holds
pub fn equals_true(term: Term) -> Formula {
    Term::apply(EQUALS, vec![Term::bool(true), term])
}

/// Conjunction of `formulas`
///
/// Nested conjunctions are flattened and `#Top` conjuncts dropped. An empty
/// conjunction is `#Top`, a single conjunct is returned as is.
pub fn and(formulas: Vec<Formula>) -> Formula {
    let mut conjuncts = Vec::with_capacity(formulas.len());
    for formula in formulas {
        match formula {
            Term::Apply { label, args } if label == AND => conjuncts.extend(args),
            f if f.is_top() => {}
            f => conjuncts.push(f),
        }
    }
    match conjuncts.len() {
        0 => Term::top(),
        1 => conjuncts.remove(0),
        _ => Term::apply(AND, conjuncts),
    }
}

/// Disjunction of `formulas`
///
/// An empty disjunction is `#Bottom`, a single disjunct is returned as is.
pub fn or(formulas: Vec<Formula>) -> Formula {
    let mut disjuncts = Vec::with_capacity(formulas.len());
    for formula in formulas {
        match formula {
            Term::Apply { label, args } if label == OR => disjuncts.extend(args),
            f if f.is_bottom() => {}
            f => disjuncts.push(f),
        }
    }
    match disjuncts.len() {
        0 => Term::bottom(),
        1 => disjuncts.remove(0),
        _ => Term::apply(OR, disjuncts),
    }
}

/// Negation of `formula`
pub fn not(formula: Formula) -> Formula {
    Term::apply(NOT, vec![formula])
}

/// `a >=Int b`
pub fn ge_int(a: Term, b: Term) -> Term {
    Term::apply("_>=Int_", vec![a, b])
}

/// `a >Int b`
pub fn gt_int(a: Term, b: Term) -> Term {
    Term::apply("_>Int_", vec![a, b])
}

/// `a <=Int b`
pub fn le_int(a: Term, b: Term) -> Term {
    Term::apply("_<=Int_", vec![a, b])
}

/// `a <Int b`
pub fn lt_int(a: Term, b: Term) -> Term {
    Term::apply("_<Int_", vec![a, b])
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable { name } => write!(f, "{}", name),
            Term::Token { token, .. } => write!(f, "{}", token),
            Term::Apply { label, args } if label == AND || label == OR => {
                let sep = format!(" {} ", label);
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", parts.join(&sep))
            }
            Term::Apply { label, args } if label == EQUALS && args.len() == 2 => {
                if args[0] == Term::bool(true) {
                    write!(f, "{}", args[1])
                } else {
                    write!(f, "{} #Equals {}", args[0], args[1])
                }
            }
            Term::Apply { label, args }
                if args.len() == 2
                    && label.len() > 2
                    && label.starts_with('_')
                    && label.ends_with('_') =>
            {
                // infix symbol: `_>=Int_`
                let op = &label[1..label.len() - 1];
                write!(f, "{} {} {}", args[0], op, args[1])
            }
            Term::Apply { label, args } if args.is_empty() => write!(f, "{}", label),
            Term::Apply { label, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", label, parts.join(", "))
            }
            Term::Sequence { items } => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "{}", parts.join(" ~> "))
            }
        }
    }
}
