//! Tracing hooks for debugging the matcher.
//!
//! The matcher is generic over its tracer. With [`NoopTracer`] every hook is
//! an empty `#[inline(always)]` function and compiles away, so tracing costs
//! nothing unless a host asks for it.

use grammode_core::NodeId;

use super::program::Program;

/// Verbosity level for trace output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Matches, forced skips, fallbacks, lookaheads.
    #[default]
    Default,
    /// Adds backtracking and recursion-limit hits.
    Verbose,
    /// Adds every node the matcher enters.
    VeryVerbose,
}

/// Matcher instrumentation.
///
/// Positions are byte offsets into the text being matched: the line
/// remainder for ordinary steps, the lookahead window inside lookaheads.
pub trait Tracer {
    /// Called when the matcher starts trying the steps of `node`.
    fn trace_enter(&mut self, node: NodeId, pos: usize);

    /// Called when step `step` of `node` consumed `pos..end`.
    fn trace_match(&mut self, node: NodeId, step: usize, pos: usize, end: usize);

    /// Called when the last step of `node` is taken without matching.
    fn trace_skip(&mut self, node: NodeId, pos: usize);

    /// Called when everything after step `step` of `node` failed.
    fn trace_backtrack(&mut self, node: NodeId, step: usize);

    /// Called after a lookahead sub-graph run.
    fn trace_lookahead(&mut self, entry: NodeId, pos: usize, matched: bool);

    /// Called when the TOKEN entry is pushed after the main run failed.
    fn trace_fallback(&mut self, pos: usize);

    /// Called when a pending return out of `node` is committed before the
    /// fallback.
    fn trace_unwind(&mut self, node: NodeId);

    /// Called when recursion reached `depth`, past the configured limit.
    fn trace_limit(&mut self, depth: u32);
}

/// No-op tracer that gets optimized away completely.
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn trace_enter(&mut self, _node: NodeId, _pos: usize) {}

    #[inline(always)]
    fn trace_match(&mut self, _node: NodeId, _step: usize, _pos: usize, _end: usize) {}

    #[inline(always)]
    fn trace_skip(&mut self, _node: NodeId, _pos: usize) {}

    #[inline(always)]
    fn trace_backtrack(&mut self, _node: NodeId, _step: usize) {}

    #[inline(always)]
    fn trace_lookahead(&mut self, _entry: NodeId, _pos: usize, _matched: bool) {}

    #[inline(always)]
    fn trace_fallback(&mut self, _pos: usize) {}

    #[inline(always)]
    fn trace_unwind(&mut self, _node: NodeId) {}

    #[inline(always)]
    fn trace_limit(&mut self, _depth: u32) {}
}

/// Tracer that collects one line per event.
pub struct PrintTracer<'p> {
    program: &'p Program,
    verbosity: Verbosity,
    lines: Vec<String>,
}

impl<'p> PrintTracer<'p> {
    pub fn new(program: &'p Program, verbosity: Verbosity) -> Self {
        Self {
            program,
            verbosity,
            lines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Collected lines joined by newlines.
    pub fn dump(&self) -> String {
        self.lines.join("\n")
    }

    fn node(&self, node: NodeId) -> String {
        format!("N{} {}", node, self.program.label(node))
    }
}

impl Tracer for PrintTracer<'_> {
    fn trace_enter(&mut self, node: NodeId, pos: usize) {
        if self.verbosity == Verbosity::VeryVerbose {
            let line = format!("enter     {} @{}", self.node(node), pos);
            self.lines.push(line);
        }
    }

    fn trace_match(&mut self, node: NodeId, step: usize, pos: usize, end: usize) {
        let line = format!("match     {} #{} {}..{}", self.node(node), step, pos, end);
        self.lines.push(line);
    }

    fn trace_skip(&mut self, node: NodeId, pos: usize) {
        let line = format!("skip      {} @{}", self.node(node), pos);
        self.lines.push(line);
    }

    fn trace_backtrack(&mut self, node: NodeId, step: usize) {
        if self.verbosity != Verbosity::Default {
            let line = format!("backtrack {} #{}", self.node(node), step);
            self.lines.push(line);
        }
    }

    fn trace_lookahead(&mut self, entry: NodeId, pos: usize, matched: bool) {
        let outcome = if matched { "ok" } else { "fail" };
        let line = format!("lookahead {} @{} {}", self.node(entry), pos, outcome);
        self.lines.push(line);
    }

    fn trace_fallback(&mut self, pos: usize) {
        self.lines.push(format!("fallback  TOKEN @{}", pos));
    }

    fn trace_unwind(&mut self, node: NodeId) {
        let line = format!("unwind    {}", self.node(node));
        self.lines.push(line);
    }

    fn trace_limit(&mut self, depth: u32) {
        if self.verbosity != Verbosity::Default {
            self.lines.push(format!("limit     depth {}", depth));
        }
    }
}
