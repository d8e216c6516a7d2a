//! Error types for proof graph operations

use crate::graph::NodeId;
use thiserror::Error;

/// Proof graph errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    /// Operation referenced an absent node, edge, split or cover
    ///
    /// **Triggered by:** `remove_node(7)` when node 7 was never created or already removed
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing item
        what: String,
    },

    // Ingestion errors
    /// A new edge, split or cover names an endpoint that does not exist
    ///
    /// **Triggered by:** `create_edge(1, 42, ..)` with no node 42
    /// **Guarantee:** rejected before any mutation
    #[error("Invalid reference in {context}: node {id} does not exist")]
    InvalidReference {
        /// Operation that was rejected
        context: String,
        /// The dangling node id
        id: NodeId,
    },

    /// A mutation would break a structural invariant of the graph
    ///
    /// **Triggered by:** giving a node both a split and an edge as successors,
    /// making a node the target of two splits, or closing a cycle of splits
    #[error("Structural conflict: {message}")]
    StructuralConflict {
        /// Invariant that would be violated
        message: String,
    },

    /// Edge without steps
    #[error("Invalid edge: {message}")]
    InvalidEdge {
        /// Error description
        message: String,
    },

    /// Split without branches
    #[error("Invalid split: {message}")]
    InvalidSplit {
        /// Error description
        message: String,
    },

    // External errors
    /// Failure raised by a mergeability oracle
    ///
    /// Propagated unchanged to the `merge_nodes` caller.
    #[error("Oracle error: {message}")]
    Oracle {
        /// Error message
        message: String,
    },

    /// Structured export or import failed
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Missing node
    pub fn node_not_found(id: NodeId) -> Self {
        Error::NotFound {
            what: format!("node {}", id),
        }
    }

    /// Missing edge between two nodes
    pub fn edge_not_found(source: NodeId, target: NodeId) -> Self {
        Error::NotFound {
            what: format!("edge {} -> {}", source, target),
        }
    }

    /// Missing split out of a node
    pub fn split_not_found(source: NodeId) -> Self {
        Error::NotFound {
            what: format!("split from {}", source),
        }
    }

    /// Missing cover between two nodes
    pub fn cover_not_found(source: NodeId, target: NodeId) -> Self {
        Error::NotFound {
            what: format!("cover {} -> {}", source, target),
        }
    }

    /// Dangling endpoint in a mutation
    pub fn invalid_reference(context: impl Into<String>, id: NodeId) -> Self {
        Error::InvalidReference {
            context: context.into(),
            id,
        }
    }

    /// Create a structural conflict with a message
    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::StructuralConflict {
            message: msg.into(),
        }
    }

    /// Create an oracle error with a message
    pub fn oracle(msg: impl Into<String>) -> Self {
        Error::Oracle {
            message: msg.into(),
        }
    }

    /// True for errors that reject a mutation before it is applied
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidReference { .. }
                | Error::StructuralConflict { .. }
                | Error::InvalidEdge { .. }
                | Error::InvalidSplit { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type for proof graph operations
pub type Result<T> = std::result::Result<T, Error>;
