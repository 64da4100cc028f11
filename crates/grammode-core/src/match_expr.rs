//! Match expressions tested by graph edges.
//!
//! A `MatchExpr` is an immutable value. The [`MatchExpr::sequence`] and
//! [`MatchExpr::choice`] constructors normalize as they build: nested
//! compositions of the same kind are flattened, adjacent literals merge, and
//! `X* X` / `X X*` fold into `X+`. Isolated matches (newlines, the wildcard,
//! lookaheads, predicates) are never merged with a neighbor.
//!
//! Runtime semantics are PEG-like: choices are ordered and repeats are
//! possessive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

#[cfg(test)]
#[path = "match_expr_tests.rs"]
mod match_expr_tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepeatKind {
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
    /// `?`
    Optional,
}

impl RepeatKind {
    pub fn symbol(self) -> char {
        match self {
            Self::ZeroOrMore => '*',
            Self::OneOrMore => '+',
            Self::Optional => '?',
        }
    }
}

/// What a lookahead tests: an inline match or a sub-graph run as its own machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookaheadTarget {
    Inline(Box<MatchExpr>),
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchExpr {
    /// Matches the empty string.
    Null,
    Literal(String),
    /// Inclusive character range.
    Range {
        from: char,
        to: char,
    },
    /// Any single character, newline included.
    Any,
    Sequence(Vec<MatchExpr>),
    Choice(Vec<MatchExpr>),
    Repeat {
        kind: RepeatKind,
        expr: Box<MatchExpr>,
    },
    /// Zero-width test of what follows.
    Lookahead {
        positive: bool,
        target: LookaheadTarget,
    },
    /// Named host-provided zero-width test.
    Predicate(String),
}

impl MatchExpr {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn range(from: char, to: char) -> Self {
        Self::Range { from, to }
    }

    pub fn repeat(kind: RepeatKind, expr: MatchExpr) -> Self {
        Self::Repeat {
            kind,
            expr: Box::new(expr),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// True for matches that must not be concatenated with a neighbor.
    pub fn is_isolated(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Literal(value) => value.contains('\n'),
            Self::Range { from, to } => *from <= '\n' && '\n' <= *to,
            Self::Any | Self::Lookahead { .. } | Self::Predicate(_) => true,
            Self::Sequence(items) | Self::Choice(items) => items.iter().any(Self::is_isolated),
            Self::Repeat { expr, .. } => expr.is_isolated(),
        }
    }

    /// True if the match can succeed without consuming input.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Null | Self::Lookahead { .. } | Self::Predicate(_) => true,
            Self::Literal(value) => value.is_empty(),
            Self::Range { .. } | Self::Any => false,
            Self::Sequence(items) => items.iter().all(Self::is_nullable),
            Self::Choice(items) => items.iter().any(Self::is_nullable),
            Self::Repeat { kind, expr } => *kind != RepeatKind::OneOrMore || expr.is_nullable(),
        }
    }

    /// Concatenate two matches, keeping the result normalized.
    pub fn sequence(left: MatchExpr, right: MatchExpr) -> MatchExpr {
        if left.is_null() {
            return right;
        }
        if right.is_null() {
            return left;
        }

        let mut items = match left {
            Self::Sequence(items) => items,
            other => vec![other],
        };
        let rest = match right {
            Self::Sequence(items) => items,
            other => vec![other],
        };
        for item in rest {
            push_sequence_item(&mut items, item);
        }

        if items.len() == 1 {
            items.pop().unwrap_or(Self::Null)
        } else {
            Self::Sequence(items)
        }
    }

    /// Ordered choice between two matches, keeping the result normalized.
    ///
    /// A null right-hand side turns the left side optional. A null left-hand
    /// side always wins, so the right side is dropped.
    pub fn choice(left: MatchExpr, right: MatchExpr) -> MatchExpr {
        if left.is_null() {
            return left;
        }
        if right.is_null() {
            return match left {
                Self::Repeat {
                    kind: RepeatKind::Optional | RepeatKind::ZeroOrMore,
                    ..
                } => left,
                other => Self::repeat(RepeatKind::Optional, other),
            };
        }

        let mut items = match left {
            Self::Choice(items) => items,
            other => vec![other],
        };
        let rest = match right {
            Self::Choice(items) => items,
            other => vec![other],
        };
        for item in rest {
            if !items.contains(&item) {
                items.push(item);
            }
        }

        if items.len() == 1 {
            items.pop().unwrap_or(Self::Null)
        } else {
            Self::Choice(items)
        }
    }

    /// Calls `f` with every sub-graph entry referenced by a lookahead.
    pub fn visit_nodes(&self, f: &mut impl FnMut(NodeId)) {
        match self {
            Self::Lookahead {
                target: LookaheadTarget::Node(id),
                ..
            } => f(*id),
            Self::Lookahead {
                target: LookaheadTarget::Inline(expr),
                ..
            }
            | Self::Repeat { expr, .. } => expr.visit_nodes(f),
            Self::Sequence(items) | Self::Choice(items) => {
                for item in items {
                    item.visit_nodes(f);
                }
            }
            Self::Null | Self::Literal(_) | Self::Range { .. } | Self::Any | Self::Predicate(_) => {}
        }
    }

    /// Rewrites every lookahead sub-graph reference through `f`.
    pub fn remap_nodes(&mut self, f: &impl Fn(NodeId) -> NodeId) {
        match self {
            Self::Lookahead {
                target: LookaheadTarget::Node(id),
                ..
            } => *id = f(*id),
            Self::Lookahead {
                target: LookaheadTarget::Inline(expr),
                ..
            }
            | Self::Repeat { expr, .. } => expr.remap_nodes(f),
            Self::Sequence(items) | Self::Choice(items) => {
                for item in items {
                    item.remap_nodes(f);
                }
            }
            Self::Null | Self::Literal(_) | Self::Range { .. } | Self::Any | Self::Predicate(_) => {}
        }
    }

    /// Renders the match as an anchored regex pattern when a regex engine
    /// would agree with PEG semantics on it.
    ///
    /// That holds for single leaves, choices of leaves, repeats of a single
    /// character class, and sequences of fixed leaves ending in any of these.
    /// Anything where regex backtracking could pick a different match than an
    /// ordered, possessive matcher returns `None`.
    pub fn to_regex_pattern(&self) -> Option<String> {
        match self {
            Self::Literal(value) if !value.is_empty() => Some(regex_syntax::escape(value)),
            Self::Range { .. } | Self::Any => self.atom_pattern(),
            Self::Choice(items) if items.iter().all(Self::is_leaf) => self.atom_pattern(),
            Self::Repeat { kind, expr } if expr.is_char_class() => {
                Some(format!("{}{}", expr.atom_pattern()?, kind.symbol()))
            }
            Self::Sequence(items) => {
                let (last, init) = items.split_last()?;
                let mut out = String::new();
                for item in init {
                    if !item.is_leaf() {
                        return None;
                    }
                    out.push_str(&item.atom_pattern()?);
                }
                out.push_str(&last.to_regex_pattern()?);
                Some(out)
            }
            _ => None,
        }
    }

    /// Fixed-width, single-alternative match.
    fn is_leaf(&self) -> bool {
        match self {
            Self::Literal(value) => !value.is_empty(),
            Self::Range { .. } | Self::Any => true,
            _ => false,
        }
    }

    /// Matches exactly one character.
    fn is_char_class(&self) -> bool {
        match self {
            Self::Literal(value) => value.chars().count() == 1,
            Self::Range { .. } | Self::Any => true,
            Self::Choice(items) => items.iter().all(Self::is_char_class),
            _ => false,
        }
    }

    /// Pattern that can be followed by a quantifier or concatenated safely.
    fn atom_pattern(&self) -> Option<String> {
        match self {
            Self::Literal(value) if !value.is_empty() => Some(regex_syntax::escape(value)),
            Self::Range { from, to } if from == to => Some(regex_syntax::escape(&from.to_string())),
            Self::Range { from, to } => Some(format!("[{}-{}]", class_char(*from), class_char(*to))),
            Self::Any => Some("(?s:.)".to_string()),
            Self::Choice(items) => {
                let alternatives = items
                    .iter()
                    .map(Self::atom_pattern)
                    .collect::<Option<Vec<_>>>()?;
                Some(format!("(?:{})", alternatives.join("|")))
            }
            _ => None,
        }
    }

    fn needs_parens(&self) -> bool {
        match self {
            Self::Sequence(items) | Self::Choice(items) => items.len() > 1,
            _ => false,
        }
    }
}

fn push_sequence_item(items: &mut Vec<MatchExpr>, item: MatchExpr) {
    let Some(prev) = items.pop() else {
        items.push(item);
        return;
    };

    let merged = match (prev, item) {
        (prev, item) if prev.is_isolated() || item.is_isolated() => {
            items.push(prev);
            item
        }
        (MatchExpr::Literal(mut prev), MatchExpr::Literal(next)) => {
            prev.push_str(&next);
            MatchExpr::Literal(prev)
        }
        (
            MatchExpr::Repeat {
                kind: RepeatKind::ZeroOrMore,
                expr,
            },
            item,
        ) if *expr == item => MatchExpr::Repeat {
            kind: RepeatKind::OneOrMore,
            expr,
        },
        (
            prev,
            MatchExpr::Repeat {
                kind: RepeatKind::ZeroOrMore,
                expr,
            },
        ) if *expr == prev => MatchExpr::Repeat {
            kind: RepeatKind::OneOrMore,
            expr,
        },
        (prev, item) => {
            items.push(prev);
            item
        }
    };
    items.push(merged);
}

fn class_char(c: char) -> String {
    if c.is_alphanumeric() {
        c.to_string()
    } else {
        format!("\\x{{{:X}}}", c as u32)
    }
}

impl fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "ε"),
            Self::Literal(value) => write!(f, "{:?}", value),
            Self::Range { from, to } => write!(f, "{:?}-{:?}", from, to),
            Self::Any => write!(f, "_"),
            Self::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    if matches!(item, Self::Choice(_)) {
                        write!(f, "({})", item)?;
                    } else {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Self::Choice(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Self::Repeat { kind, expr } => {
                if expr.needs_parens() {
                    write!(f, "({}){}", expr, kind.symbol())
                } else {
                    write!(f, "{}{}", expr, kind.symbol())
                }
            }
            Self::Lookahead { positive, target } => {
                let sigil = if *positive { '&' } else { '!' };
                match target {
                    LookaheadTarget::Node(id) => write!(f, "{}N{}", sigil, id),
                    LookaheadTarget::Inline(expr) if expr.needs_parens() => {
                        write!(f, "{}({})", sigil, expr)
                    }
                    LookaheadTarget::Inline(expr) => write!(f, "{}{}", sigil, expr),
                }
            }
            Self::Predicate(name) => write!(f, "@{}", name),
        }
    }
}
