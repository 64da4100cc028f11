//! Host-facing tokenizer.

use std::rc::Rc;

use super::context::Context;
use super::input::{LineSource, MatchInput};
use super::matcher::{MatchLimits, Matcher};
use super::program::Program;
use super::state::{State, chain_contains};
use super::trace::{NoopTracer, Tracer};

/// Result of one tokenizer step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advance {
    /// Bytes of the line consumed. Zero only at the end of the line.
    pub consumed: usize,
    /// Styles of the contexts the token was matched in, outermost first,
    /// followed by the token's own style.
    pub style: Option<String>,
}

/// A loaded program plus the limits it runs with.
///
/// Hosts keep one [`State`] per line and call [`Mode::advance_token`]
/// repeatedly until the line is consumed.
pub struct Mode {
    program: Program,
    limits: MatchLimits,
}

impl Mode {
    pub fn new(program: Program) -> Self {
        Self::with_limits(program, MatchLimits::default())
    }

    pub fn with_limits(program: Program, limits: MatchLimits) -> Self {
        Self { program, limits }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn limits(&self) -> MatchLimits {
        self.limits
    }

    pub fn start_state(&self) -> State {
        State::new(self.program.start())
    }

    pub fn copy_state(&self, state: &State) -> State {
        state.clone()
    }

    /// Matches one token of `line` starting at byte `pos`.
    ///
    /// `lines` gives access to the lines after this one, for lookaheads.
    pub fn advance_token<L>(&self, state: &mut State, line: &str, pos: usize, lines: &L) -> Advance
    where
        L: LineSource + ?Sized,
    {
        self.advance_token_with(state, line, pos, lines, &mut NoopTracer)
    }

    /// [`Mode::advance_token`] with a tracer.
    pub fn advance_token_with<L, T>(
        &self,
        state: &mut State,
        line: &str,
        pos: usize,
        lines: &L,
        tracer: &mut T,
    ) -> Advance
    where
        L: LineSource + ?Sized,
        T: Tracer,
    {
        let look = |n: usize| lines.look_ahead(n);
        let input = MatchInput::new(line, pos, &look, self.limits.lookahead_lines);
        let rest = input.rest_len();
        if rest == 0 {
            return Advance::default();
        }

        let mut matcher = Matcher::new(&self.program, &input, self.limits, tracer);
        let (end, style) = match matcher.forward(state, 0) {
            Some(end) => (end, matcher.style()),
            // Only reachable without a TOKEN entry: take one character as is.
            None => {
                let width = input.text().chars().next().map_or(1, char::len_utf8);
                (width, None)
            }
        };

        let consumed = end.min(rest);
        if end == rest {
            // Let newline-sensitive rules see the end of the line.
            matcher.forward(state, rest);
        }
        Advance { consumed, style }
    }

    /// Feeds the newline of an empty line.
    pub fn advance_blank_line<L>(&self, state: &mut State, lines: &L)
    where
        L: LineSource + ?Sized,
    {
        self.advance_blank_line_with(state, lines, &mut NoopTracer);
    }

    pub fn advance_blank_line_with<L, T>(&self, state: &mut State, lines: &L, tracer: &mut T)
    where
        L: LineSource + ?Sized,
        T: Tracer,
    {
        let look = |n: usize| lines.look_ahead(n);
        let input = MatchInput::new("", 0, &look, self.limits.lookahead_lines);
        let mut matcher = Matcher::new(&self.program, &input, self.limits, tracer);
        matcher.forward(state, 0);
    }

    /// Innermost context covering byte `pos` of `line`, for a state taken at
    /// the start of the line.
    ///
    /// Contexts opened by the token that starts at `pos` do not count.
    pub fn context_at<L>(&self, state: &State, line: &str, pos: usize, lines: &L) -> Option<Rc<Context>>
    where
        L: LineSource + ?Sized,
    {
        let look = |n: usize| lines.look_ahead(n);
        let input = MatchInput::new(line, 0, &look, self.limits.lookahead_lines);
        let mut tracer = NoopTracer;
        let mut matcher = Matcher::new(&self.program, &input, self.limits, &mut tracer);

        let mut copy = state.clone();
        let mut at = 0;
        let mut before = state.context.clone();
        loop {
            let Some(end) = matcher.run(&mut copy, at, 0, false, 0) else {
                return copy.context;
            };
            if end <= at {
                return copy.context;
            }
            if end > pos {
                let mut context = copy.context;
                if at == pos {
                    while let Some(cx) = context.clone()
                        && !chain_contains(before.as_ref(), &cx)
                    {
                        context = cx.parent.clone();
                    }
                }
                return context;
            }
            at = end;
            before = copy.context.clone();
        }
    }
}
