//! Runtime engine for executing compiled grammode graphs.
//!
//! The matcher walks the pushdown graph against the current line,
//! producing one token per step and updating the caller's state.

mod context;
mod error;
mod input;
mod matcher;
mod mode;
mod predicate;
mod program;
mod state;
mod trace;

#[cfg(test)]
mod engine_tests;

pub use context::Context;
pub use error::LoadError;
pub use input::{LineSource, NoLookahead};
pub use matcher::MatchLimits;
pub use mode::{Advance, Mode};
pub use predicate::{PredicateFn, Predicates};
pub use program::Program;
pub use state::{Contexts, State};
pub use trace::{NoopTracer, PrintTracer, Tracer, Verbosity};
