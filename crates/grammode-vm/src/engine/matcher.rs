//! Backtracking interpreter over lowered steps.
//!
//! `run` tries the steps of the node on top of the stack in order. A step
//! that consumes input ends the run; a zero-width step continues at its
//! destination, and a failure further down restores the state from before
//! the step and moves on to the next sibling. When nothing matches, the last
//! step may be taken without matching, at most `max_skip` times per run.
//!
//! Returns that cannot be avoided are taken right after a token: a node whose
//! only step is a zero-width return is left immediately. Before the TOKEN
//! fallback every other pending return is committed as well.

use std::rc::Rc;
use std::sync::Arc;

use grammode_core::NodeId;

use super::context::Context;
use super::input::MatchInput;
use super::program::{Lookahead, Op, Program, Step};
use super::state::{State, compose_style};
use super::trace::Tracer;

/// Runtime limits for matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchLimits {
    /// Forced zero-width steps per token (default: 2).
    pub(crate) max_skip: u32,
    /// Following lines visible to lookaheads (default: 2).
    pub(crate) lookahead_lines: usize,
    /// Maximum matcher recursion depth (default: 1,024).
    pub(crate) recursion_limit: u32,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            max_skip: 2,
            lookahead_lines: 2,
            recursion_limit: 1024,
        }
    }
}

impl MatchLimits {
    /// Create new match limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the forced-step budget.
    pub fn max_skip(mut self, max_skip: u32) -> Self {
        self.max_skip = max_skip;
        self
    }

    /// Set how many following lines lookaheads may read.
    pub fn lookahead_lines(mut self, lines: usize) -> Self {
        self.lookahead_lines = lines;
        self
    }

    /// Set the recursion limit.
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn get_max_skip(&self) -> u32 {
        self.max_skip
    }
    pub fn get_lookahead_lines(&self) -> usize {
        self.lookahead_lines
    }
    pub fn get_recursion_limit(&self) -> u32 {
        self.recursion_limit
    }
}

pub(crate) struct Matcher<'a, 'i, T: Tracer> {
    program: &'a Program,
    input: &'a MatchInput<'i>,
    limits: MatchLimits,
    tracer: &'a mut T,
    /// Text positions refer to: the line remainder, or the lookahead window.
    text: &'a str,
    /// Scope of the last step that consumed input.
    consumed: Option<Consumed>,
}

/// Contexts open while a step matched, plus the step's own style.
#[derive(Clone)]
struct Consumed {
    context: Option<Rc<Context>>,
    style: Option<Arc<str>>,
}

impl<'a, 'i, T: Tracer> Matcher<'a, 'i, T> {
    pub(crate) fn new(
        program: &'a Program,
        input: &'a MatchInput<'i>,
        limits: MatchLimits,
        tracer: &'a mut T,
    ) -> Self {
        Self {
            program,
            input,
            limits,
            tracer,
            text: input.text(),
            consumed: None,
        }
    }

    /// Style of the last token: open context styles, outermost first, then
    /// the step's own.
    pub(crate) fn style(&self) -> Option<String> {
        let consumed = self.consumed.as_ref()?;
        compose_style(consumed.context.as_deref(), consumed.style.as_deref())
    }

    /// Matches one token at `pos`, falling back to the TOKEN entry when the
    /// main run fails.
    ///
    /// Before the fallback, pending returns are committed so the fallback
    /// token is matched in the scope the line actually ended in. Returns the
    /// end of the token; on `None` only those returns were applied.
    pub(crate) fn forward(&mut self, state: &mut State, pos: usize) -> Option<usize> {
        self.consumed = None;
        let saved = state.clone();
        if let Some(end) = self.run(state, pos, self.limits.max_skip, false, 0)
            && end > pos
        {
            return Some(end);
        }
        *state = saved;
        self.consumed = None;
        self.unwind(state, pos);

        let token = self.program.token()?;
        let saved = state.clone();
        self.tracer.trace_fallback(pos);
        state.stack.push(token);
        if let Some(end) = self.run(state, pos, 0, false, 0)
            && end > pos
        {
            return Some(end);
        }
        *state = saved;
        self.consumed = None;
        None
    }

    /// Runs from the node on top of the stack until input is consumed or the
    /// stack empties. Returns the end position.
    pub(crate) fn run(
        &mut self,
        state: &mut State,
        pos: usize,
        max_skip: u32,
        forbid_descent: bool,
        depth: u32,
    ) -> Option<usize> {
        if depth > self.limits.recursion_limit {
            self.tracer.trace_limit(depth);
            return None;
        }
        let &node = state.stack.last()?;
        let program = self.program;
        let steps = program.steps(node);
        let entry_len = state.stack.len();
        let at = self.input.offset() + pos;
        self.tracer.trace_enter(node, pos);

        for (index, step) in steps.iter().enumerate() {
            let last = index + 1 == steps.len();
            if forbid_descent && step.has_call() {
                continue;
            }

            let checkpoint = state.clone();
            for action in &step.pre {
                state.apply(action, at);
            }
            let (end, forced) = match self.match_op(&step.op, state, pos, depth) {
                Some(end) => (end, false),
                None if last && max_skip > 0 && !step.has_call() => {
                    self.tracer.trace_skip(node, pos);
                    (pos, true)
                }
                None => {
                    *state = checkpoint;
                    continue;
                }
            };
            let context = (end > pos).then(|| state.context.clone());
            for action in &step.post {
                state.apply(action, at + (end - pos));
            }
            state.go(step.to);

            if let Some(context) = context {
                self.tracer.trace_match(node, index, pos, end);
                self.consumed = Some(Consumed {
                    context,
                    style: step.style.clone(),
                });
                self.settle(state);
                return Some(end);
            }
            if state.stack.is_empty() {
                return Some(end);
            }

            let budget = if forced {
                max_skip - 1
            } else if last {
                max_skip
            } else {
                0
            };
            // After a forced return, recovery must not wander into new rules.
            let forbid = forbid_descent || (forced && state.stack.len() < entry_len);
            if let Some(end) = self.run(state, pos, budget, forbid, depth + 1) {
                return Some(end);
            }
            self.tracer.trace_backtrack(node, index);
            *state = checkpoint;
        }
        None
    }

    /// Takes returns that are the only way out of the node on top, so a
    /// later failed run cannot resurrect the frames they close.
    fn settle(&self, state: &mut State) {
        let program = self.program;
        while let Some(&node) = state.stack.last()
            && let [step] = program.steps(node)
            && step.to.is_none()
            && step.only_pops()
        {
            for action in &step.pre {
                state.apply(action, 0);
            }
            state.go(None);
        }
    }

    /// Commits every return reachable from the top node through zero-width
    /// steps that only close contexts, taking the first such path in step
    /// order. The bottom frame is never popped.
    fn unwind(&mut self, state: &mut State, pos: usize) {
        let program = self.program;
        let at = self.input.offset() + pos;
        let mut path = Vec::new();
        while state.stack.len() > 1 {
            let Some(&node) = state.stack.last() else {
                break;
            };
            path.clear();
            if !pending_return(program, node, &mut path) {
                break;
            }
            self.tracer.trace_unwind(node);
            for step in &path {
                for action in &step.pre {
                    state.apply(action, at);
                }
                state.go(step.to);
            }
        }
    }

    fn match_op(&mut self, op: &Op, state: &State, pos: usize, depth: u32) -> Option<usize> {
        let text = self.text;
        match op {
            Op::Null => Some(pos),
            Op::Literal(value) => text
                .get(pos..)?
                .starts_with(&**value)
                .then(|| pos + value.len()),
            Op::Range(from, to) => {
                let c = text.get(pos..)?.chars().next()?;
                (*from <= c && c <= *to).then(|| pos + c.len_utf8())
            }
            Op::Any => {
                let c = text.get(pos..)?.chars().next()?;
                Some(pos + c.len_utf8())
            }
            Op::Regex(index) => self.program.regex_end(*index, text, pos),
            Op::Sequence(items) => {
                let mut end = pos;
                for item in items {
                    end = self.match_op(item, state, end, depth)?;
                }
                Some(end)
            }
            Op::Choice(items) => items
                .iter()
                .find_map(|item| self.match_op(item, state, pos, depth)),
            Op::Star(inner) => Some(self.repeat(inner, state, pos, depth)),
            Op::Plus(inner) => {
                let first = self.match_op(inner, state, pos, depth)?;
                Some(self.repeat(inner, state, first, depth))
            }
            Op::Optional(inner) => Some(self.match_op(inner, state, pos, depth).unwrap_or(pos)),
            Op::Lookahead { positive, target } => {
                (self.lookahead(target, state, pos, depth) == *positive).then_some(pos)
            }
            Op::Predicate(index) => {
                let f = self.program.predicate(*index)?;
                let input = self.input;
                f(input.line(), input.offset() + pos, state.context()).then_some(pos)
            }
        }
    }

    /// Possessive repetition. A zero-width iteration ends the loop.
    fn repeat(&mut self, inner: &Op, state: &State, mut pos: usize, depth: u32) -> usize {
        while let Some(end) = self.match_op(inner, state, pos, depth)
            && end > pos
        {
            pos = end;
        }
        pos
    }

    /// Tests `target` against the lookahead window without consuming input.
    fn lookahead(&mut self, target: &Lookahead, state: &State, pos: usize, depth: u32) -> bool {
        let input = self.input;
        let outer = std::mem::replace(&mut self.text, input.window());
        let consumed = self.consumed.take();

        let matched = match target {
            Lookahead::Inline(op) => self.match_op(op, state, pos, depth).is_some(),
            Lookahead::Node(entry) => {
                let matched = self.run_lookahead(*entry, pos, depth);
                self.tracer.trace_lookahead(*entry, pos, matched);
                matched
            }
        };

        self.text = outer;
        self.consumed = consumed;
        matched
    }

    /// Runs a sub-graph on a scratch state until it returns from its entry.
    fn run_lookahead(&mut self, entry: NodeId, mut pos: usize, depth: u32) -> bool {
        let mut scratch = State::new(entry);
        loop {
            match self.run(&mut scratch, pos, 0, false, depth + 1) {
                None => return false,
                Some(_) if scratch.stack.is_empty() => return true,
                Some(end) => pos = end,
            }
        }
    }
}

/// Finds a path of pop-only zero-width steps from `node` that ends in a
/// return. Paths are bounded by the node count.
fn pending_return<'p>(program: &'p Program, node: NodeId, path: &mut Vec<&'p Step>) -> bool {
    if path.len() > program.node_count() {
        return false;
    }
    for step in program.steps(node) {
        if !step.only_pops() {
            continue;
        }
        path.push(step);
        match step.to {
            None => return true,
            Some(next) if pending_return(program, next, path) => return true,
            Some(_) => {
                path.pop();
            }
        }
    }
    false
}
