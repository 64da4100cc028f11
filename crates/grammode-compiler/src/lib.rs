//! Grammode compiler: rule sets in, simplified pushdown graphs out.
//!
//! Pipeline:
//! - `json` / `ast` - the rule-expression tree and its JSON loader
//! - `resolve` - rule table validation and recursion analysis
//! - `build` - graph generation (inlining, instantiation, skip threading)
//! - `simplify` - fixpoint peephole passes, with `inline`, `dce`, and `merge`
//! - `verify` - rejection of cycles that consume no input
//! - `diagnostics` - error reporting

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod build;
pub mod dce;
pub mod diagnostics;
pub mod inline;
pub mod json;
pub mod merge;
mod resolve;
pub mod simplify;
pub mod verify;


pub use ast::{Expr, ExprKind, Grammar, RuleDecl};
pub use build::{BuildOptions, build_graph};
pub use diagnostics::{DiagnosticKind, Diagnostics, DiagnosticsPrinter, Severity};
pub use grammode_core::{Graph, Span};
pub use json::GrammarLoadError;
pub use simplify::{SimplifyStats, simplify};

/// Errors that can occur while compiling a grammar.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    GrammarLoad(#[from] GrammarLoadError),

    #[error("grammar build failed with {} errors", .0.error_count())]
    Build(Diagnostics),

    #[error("grammar cannot make progress: {} cycles consume no input", .0.error_count())]
    NoProgress(Diagnostics),
}

impl Error {
    /// Diagnostics behind the failure, if it was a grammar problem.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::GrammarLoad(_) => None,
            Self::Build(d) | Self::NoProgress(d) => Some(d),
        }
    }
}

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Options for [`compile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub(crate) build: BuildOptions,
    pub(crate) simplify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            simplify: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(mut self, build: BuildOptions) -> Self {
        self.build = build;
        self
    }

    /// Skip simplification to inspect the raw graph. Progress is still verified.
    pub fn simplify(mut self, simplify: bool) -> Self {
        self.simplify = simplify;
        self
    }

    pub fn get_build(&self) -> BuildOptions {
        self.build
    }

    pub fn get_simplify(&self) -> bool {
        self.simplify
    }
}

/// Builds, simplifies, and verifies the graph for `grammar`.
///
/// Warnings are dropped; use [`build_graph`] directly to see them.
pub fn compile(grammar: &Grammar, options: &CompileOptions) -> Result<Graph> {
    let (mut graph, diagnostics) = build_graph(grammar, &options.build);
    if diagnostics.has_errors() {
        return Err(Error::Build(diagnostics));
    }

    debug_dump("built", &graph);
    if options.simplify {
        simplify(&mut graph);
        debug_dump("simplified", &graph);
    }

    let mut problems = Diagnostics::new();
    verify::check_progress(&graph, &mut problems);
    if problems.has_errors() {
        return Err(Error::NoProgress(problems));
    }
    Ok(graph)
}

/// [`compile`] for a grammar in its JSON form.
pub fn compile_json(json: &str, options: &CompileOptions) -> Result<Graph> {
    let grammar = Grammar::from_json(json)?;
    compile(&grammar, options)
}

#[cfg(debug_assertions)]
fn debug_dump(stage: &str, graph: &Graph) {
    if std::env::var_os("GRAMMODE_DEBUG_GRAPH").is_some() {
        eprintln!("=== {stage} graph ===\n{}", graph.dump());
    }
}

#[cfg(not(debug_assertions))]
fn debug_dump(_stage: &str, _graph: &Graph) {}
