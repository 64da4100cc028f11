#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures shared by the grammode compiler and runtime.
//!
//! Two layers:
//! - **Match expressions** (`MatchExpr`): the values graph edges test against
//!   input, with constructors that keep compositions normalized.
//! - **Graph** (`Graph`): an arena of control points whose ordered edges carry
//!   a match, side effects, and a destination. This is the pushdown automaton
//!   the compiler produces and the runtime executes.

mod dump;
pub mod graph;
pub mod match_expr;
mod span;

pub use dump::GraphPrinter;
pub use graph::{Edge, Effect, Graph, Node, NodeId};
pub use match_expr::{LookaheadTarget, MatchExpr, RepeatKind};
pub use span::Span;
