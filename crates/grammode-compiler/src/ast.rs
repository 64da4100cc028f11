//! Attributed rule-expression tree.
//!
//! This is the shape a grammar front end hands to the graph builder. Rules
//! keep their declaration order; every expression carries the span of the
//! source text it came from so diagnostics can point back into the grammar.

use grammode_core::{MatchExpr, RepeatKind, Span};

#[cfg(test)]
#[path = "ast_tests.rs"]
mod ast_tests;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grammar {
    pub rules: Vec<RuleDecl>,
}

impl Grammar {
    pub fn new(rules: Vec<RuleDecl>) -> Self {
        Self { rules }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDecl {
    pub name: String,
    pub params: Vec<String>,
    /// Opens a nested lexical scope while the rule's body runs.
    pub context: bool,
    /// Part of the TOKEN fallback entry.
    pub token: bool,
    /// Style reported for tokens matched inside this rule.
    pub style: Option<String>,
    /// Explicit start rule. Without one, the first rule starts the grammar.
    pub start: bool,
    /// Expression matched between sequence elements of the body.
    pub skip: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

impl RuleDecl {
    pub fn new(name: impl Into<String>, body: Expr) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            context: false,
            token: false,
            style: None,
            start: false,
            skip: None,
            body,
            span: Span::default(),
        }
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_context(mut self) -> Self {
        self.context = true;
        self
    }

    pub fn with_token(mut self) -> Self {
        self.token = true;
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_start(mut self) -> Self {
        self.start = true;
        self
    }

    pub fn with_skip(mut self, skip: Expr) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Whether the body runs inside its own context frame.
    pub fn pushes_context(&self) -> bool {
        self.context || self.style.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Literal(String),
    Range { from: char, to: char },
    Any,
    /// Rule call or parameter reference.
    Ref { name: String, args: Vec<Expr> },
    Sequence(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat { kind: RepeatKind, expr: Box<Expr> },
    Lookahead { positive: bool, expr: Box<Expr> },
    Predicate(String),
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(value.into()))
    }

    pub fn range(from: char, to: char) -> Self {
        Self::new(ExprKind::Range { from, to })
    }

    pub fn any() -> Self {
        Self::new(ExprKind::Any)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::call(name, Vec::new())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Ref {
            name: name.into(),
            args,
        })
    }

    pub fn seq(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::Sequence(items))
    }

    pub fn choice(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::Choice(items))
    }

    pub fn repeat(kind: RepeatKind, expr: Expr) -> Self {
        Self::new(ExprKind::Repeat {
            kind,
            expr: Box::new(expr),
        })
    }

    pub fn star(expr: Expr) -> Self {
        Self::repeat(RepeatKind::ZeroOrMore, expr)
    }

    pub fn plus(expr: Expr) -> Self {
        Self::repeat(RepeatKind::OneOrMore, expr)
    }

    pub fn opt(expr: Expr) -> Self {
        Self::repeat(RepeatKind::Optional, expr)
    }

    pub fn lookahead(positive: bool, expr: Expr) -> Self {
        Self::new(ExprKind::Lookahead {
            positive,
            expr: Box::new(expr),
        })
    }

    pub fn predicate(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Predicate(name.into()))
    }

    /// Structural equality that ignores spans.
    pub fn same_shape(&self, other: &Expr) -> bool {
        use ExprKind::*;
        match (&self.kind, &other.kind) {
            (Literal(a), Literal(b)) => a == b,
            (Range { from: a, to: b }, Range { from: c, to: d }) => a == c && b == d,
            (Any, Any) => true,
            (Ref { name: a, args: x }, Ref { name: b, args: y }) => {
                a == b && same_shapes(x, y)
            }
            (Sequence(x), Sequence(y)) | (Choice(x), Choice(y)) => same_shapes(x, y),
            (Repeat { kind: a, expr: x }, Repeat { kind: b, expr: y }) => {
                a == b && x.same_shape(y)
            }
            (
                Lookahead {
                    positive: a,
                    expr: x,
                },
                Lookahead {
                    positive: b,
                    expr: y,
                },
            ) => a == b && x.same_shape(y),
            (Predicate(a), Predicate(b)) => a == b,
            _ => false,
        }
    }

    /// Expressions no skip is inserted next to.
    pub fn is_isolated(&self) -> bool {
        match &self.kind {
            ExprKind::Literal(value) => value.contains('\n'),
            ExprKind::Range { from, to } => *from <= '\n' && '\n' <= *to,
            ExprKind::Any | ExprKind::Lookahead { .. } | ExprKind::Predicate(_) => true,
            ExprKind::Ref { .. }
            | ExprKind::Sequence(_)
            | ExprKind::Choice(_)
            | ExprKind::Repeat { .. } => false,
        }
    }

    /// Zero-width tests and loops (which already end in a skip) take no skip after them.
    fn no_skip_after(&self) -> bool {
        match &self.kind {
            ExprKind::Lookahead { .. } | ExprKind::Predicate(_) => true,
            ExprKind::Repeat { kind, .. } => *kind != RepeatKind::Optional,
            _ => false,
        }
    }

    /// Rewrites the expression for graph generation: `skip` is threaded
    /// between sequence elements and after every loop iteration, nested
    /// sequences and choices are flattened, and rule arguments are normalized
    /// in the caller's scope.
    pub fn normalize(&self, skip: Option<&Expr>) -> Expr {
        let kind = match &self.kind {
            ExprKind::Ref { name, args } => ExprKind::Ref {
                name: name.clone(),
                args: args.iter().map(|a| a.normalize(skip)).collect(),
            },
            ExprKind::Repeat { kind, expr } => {
                let mut inner = expr.normalize(skip);
                if let Some(skip) = skip
                    && *kind != RepeatKind::Optional
                {
                    let span = inner.span;
                    inner = Expr::seq(vec![inner, skip.clone()]).at(span);
                }
                ExprKind::Repeat {
                    kind: *kind,
                    expr: Box::new(inner),
                }
            }
            ExprKind::Lookahead { positive, expr } => ExprKind::Lookahead {
                positive: *positive,
                expr: Box::new(expr.normalize(skip)),
            },
            ExprKind::Sequence(items) => {
                let mut out: Vec<Expr> = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let next = item.normalize(skip);
                    let isolated = next.is_isolated() || next.no_skip_after();
                    match next.kind {
                        ExprKind::Sequence(inner) => out.extend(inner),
                        _ => out.push(next),
                    }
                    let Some(skip) = skip else { continue };
                    let Some(following) = items.get(i + 1) else {
                        continue;
                    };
                    if !isolated && !following.is_isolated() {
                        out.push(skip.clone());
                    }
                }
                ExprKind::Sequence(out)
            }
            ExprKind::Choice(items) => {
                let mut out = Vec::new();
                for item in items {
                    let next = item.normalize(skip);
                    match next.kind {
                        ExprKind::Choice(inner) => out.extend(inner),
                        _ => out.push(next),
                    }
                }
                ExprKind::Choice(out)
            }
            other => other.clone(),
        };
        Expr {
            kind,
            span: self.span,
        }
    }

    /// Replaces references to `params` with the matching `args`.
    pub fn substitute(&self, params: &[String], args: &[Expr]) -> Expr {
        if params.is_empty() {
            return self.clone();
        }
        let kind = match &self.kind {
            ExprKind::Ref { name, args: inner } => {
                if let Some(pos) = params.iter().position(|p| p == name)
                    && let Some(arg) = args.get(pos)
                {
                    return arg.clone();
                }
                ExprKind::Ref {
                    name: name.clone(),
                    args: inner.iter().map(|a| a.substitute(params, args)).collect(),
                }
            }
            ExprKind::Sequence(items) => {
                ExprKind::Sequence(items.iter().map(|e| e.substitute(params, args)).collect())
            }
            ExprKind::Choice(items) => {
                ExprKind::Choice(items.iter().map(|e| e.substitute(params, args)).collect())
            }
            ExprKind::Repeat { kind, expr } => ExprKind::Repeat {
                kind: *kind,
                expr: Box::new(expr.substitute(params, args)),
            },
            ExprKind::Lookahead { positive, expr } => ExprKind::Lookahead {
                positive: *positive,
                expr: Box::new(expr.substitute(params, args)),
            },
            other => other.clone(),
        };
        Expr {
            kind,
            span: self.span,
        }
    }

    /// The expression as a single match, if it involves no rule calls.
    pub fn as_simple_match(&self) -> Option<MatchExpr> {
        match &self.kind {
            ExprKind::Literal(value) => Some(MatchExpr::literal(value.as_str())),
            ExprKind::Range { from, to } => Some(MatchExpr::range(*from, *to)),
            ExprKind::Any => Some(MatchExpr::Any),
            ExprKind::Ref { .. } | ExprKind::Lookahead { .. } => None,
            ExprKind::Sequence(items) => items
                .iter()
                .try_fold(MatchExpr::Null, |acc, e| {
                    Some(MatchExpr::sequence(acc, e.as_simple_match()?))
                }),
            ExprKind::Choice(items) => {
                let mut iter = items.iter();
                let first = iter.next()?.as_simple_match()?;
                iter.try_fold(first, |acc, e| {
                    Some(MatchExpr::choice(acc, e.as_simple_match()?))
                })
            }
            ExprKind::Repeat { kind, expr } => Some(MatchExpr::repeat(*kind, expr.as_simple_match()?)),
            ExprKind::Predicate(name) => Some(MatchExpr::Predicate(name.clone())),
        }
    }

    /// Rough count of the edges the expression generates.
    pub fn weight(&self) -> usize {
        match &self.kind {
            ExprKind::Literal(value) => value.matches('\n').count() * 2 + 1,
            ExprKind::Range { .. } | ExprKind::Any | ExprKind::Predicate(_) => 1,
            ExprKind::Ref { .. } => 1,
            ExprKind::Sequence(items) | ExprKind::Choice(items) => {
                items.iter().map(Expr::weight).sum::<usize>().max(1)
            }
            ExprKind::Repeat {
                kind: RepeatKind::OneOrMore,
                expr,
            } => expr.weight() * 2 + 1,
            ExprKind::Repeat { expr, .. } => expr.weight() + 2,
            ExprKind::Lookahead { expr, .. } => expr.weight() + 2,
        }
    }

    /// Visits every rule or parameter reference, arguments included.
    pub fn visit_refs<'e>(&'e self, f: &mut impl FnMut(&'e str, &'e [Expr], Span)) {
        match &self.kind {
            ExprKind::Ref { name, args } => {
                f(name, args, self.span);
                for arg in args {
                    arg.visit_refs(f);
                }
            }
            ExprKind::Sequence(items) | ExprKind::Choice(items) => {
                for item in items {
                    item.visit_refs(f);
                }
            }
            ExprKind::Repeat { expr, .. } | ExprKind::Lookahead { expr, .. } => expr.visit_refs(f),
            ExprKind::Literal(_) | ExprKind::Range { .. } | ExprKind::Any | ExprKind::Predicate(_) => {
            }
        }
    }
}

pub(crate) fn same_shapes(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
}
