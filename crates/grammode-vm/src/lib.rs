//! Incremental runtime for grammode graphs.
//!
//! A host drives the matcher one token at a time, line by line, and keeps
//! the returned [`State`] between calls. Graphs are lowered once into a
//! [`Program`]; after that nothing can fail, and malformed input always
//! yields a token of at least one character.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod engine;

pub use engine::{
    Advance, Context, Contexts, LineSource, LoadError, MatchLimits, Mode, NoLookahead,
    NoopTracer, PredicateFn, Predicates, PrintTracer, Program, State, Tracer, Verbosity,
};
