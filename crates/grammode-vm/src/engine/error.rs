//! Errors that can occur while loading a graph.

use grammode_core::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// A predicate match names a callback the host did not register.
    #[error("unknown predicate `{0}`")]
    UnknownPredicate(String),

    /// A match could not be compiled into a DFA.
    #[error("cannot compile pattern `{pattern}`: {message}")]
    Regex { pattern: String, message: String },

    #[error("node {from} refers to missing node {to}")]
    DanglingNode { from: NodeId, to: NodeId },

    #[error("entry node {0} is not live")]
    DeadEntry(NodeId),
}
