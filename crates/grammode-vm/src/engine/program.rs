//! Load-time lowering of a graph into matcher steps.
//!
//! Each edge becomes a [`Step`]. Matches a regex engine agrees on are
//! compiled to anchored dense DFAs; everything else keeps a small op tree
//! evaluated with PEG semantics. Effects are split around the match:
//! calls and context pushes run before it, pops after it, and a push closed
//! by a pop on the same edge folds into the step's token style.

use std::sync::Arc;

use grammode_core::{Edge, Effect, Graph, LookaheadTarget, MatchExpr, NodeId, RepeatKind};
use indexmap::IndexMap;
use regex_automata::dfa::{Automaton, StartKind, dense};
use regex_automata::{Anchored, Input};

use super::error::LoadError;
use super::predicate::{PredicateFn, Predicates};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Null,
    Literal(Box<str>),
    Range(char, char),
    Any,
    /// Index into `Program::regexes`.
    Regex(usize),
    Sequence(Vec<Op>),
    Choice(Vec<Op>),
    Star(Box<Op>),
    Plus(Box<Op>),
    Optional(Box<Op>),
    Lookahead { positive: bool, target: Lookahead },
    /// Index into `Program::predicates`.
    Predicate(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Lookahead {
    Inline(Box<Op>),
    /// Entry of a sub-graph run on a scratch state.
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Call { target: NodeId, return_to: NodeId },
    Push {
        name: Arc<str>,
        style: Option<Arc<str>>,
    },
    Pop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) op: Op,
    /// Applied before matching.
    pub(crate) pre: Vec<Action>,
    /// Applied once the match succeeded.
    pub(crate) post: Vec<Action>,
    /// Style reported for the input this step consumes.
    pub(crate) style: Option<Arc<str>>,
    pub(crate) to: Option<NodeId>,
}

impl Step {
    pub(crate) fn has_call(&self) -> bool {
        self.pre.iter().any(|a| matches!(a, Action::Call { .. }))
    }

    /// Zero-width step whose only effects close contexts.
    pub(crate) fn only_pops(&self) -> bool {
        self.op == Op::Null
            && self.pre.iter().chain(&self.post).all(|a| matches!(a, Action::Pop))
    }
}

/// A graph lowered for execution. Immutable and shareable across threads.
pub struct Program {
    steps: Vec<Vec<Step>>,
    labels: Vec<String>,
    start: NodeId,
    token: Option<NodeId>,
    regexes: Vec<dense::DFA<Vec<u32>>>,
    predicates: Vec<PredicateFn>,
}

impl Program {
    /// Lowers every live node of `graph`, resolving predicate names against
    /// `predicates`.
    pub fn load(graph: &Graph, predicates: &Predicates) -> Result<Self, LoadError> {
        for entry in graph.entries() {
            if !graph.is_live(entry) {
                return Err(LoadError::DeadEntry(entry));
            }
        }

        let mut lowering = Lowering {
            graph,
            predicates,
            regexes: IndexMap::new(),
            used: IndexMap::new(),
        };
        let mut steps = Vec::with_capacity(graph.len());
        let mut labels = Vec::with_capacity(graph.len());
        for id in 0..graph.len() as NodeId {
            labels.push(graph.node(id).label.clone());
            if !graph.is_live(id) {
                steps.push(Vec::new());
                continue;
            }
            let node_steps = graph
                .edges(id)
                .iter()
                .map(|edge| lowering.step(id, edge))
                .collect::<Result<Vec<_>, _>>()?;
            steps.push(node_steps);
        }

        Ok(Self {
            steps,
            labels,
            start: graph.start(),
            token: graph.token(),
            regexes: lowering.regexes.into_values().collect(),
            predicates: lowering.used.into_values().collect(),
        })
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn token(&self) -> Option<NodeId> {
        self.token
    }

    pub fn node_count(&self) -> usize {
        self.steps.len()
    }

    pub fn label(&self, node: NodeId) -> &str {
        self.labels.get(node as usize).map_or("?", String::as_str)
    }

    pub(crate) fn steps(&self, node: NodeId) -> &[Step] {
        self.steps
            .get(node as usize)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// End of the anchored match of regex `index` at `pos`.
    pub(crate) fn regex_end(&self, index: usize, text: &str, pos: usize) -> Option<usize> {
        let dfa = self.regexes.get(index)?;
        let input = Input::new(text).range(pos..).anchored(Anchored::Yes);
        dfa.try_search_fwd(&input).ok().flatten().map(|m| m.offset())
    }

    pub(crate) fn predicate(&self, index: usize) -> Option<&PredicateFn> {
        self.predicates.get(index)
    }

    #[cfg(test)]
    pub(crate) fn regex_count(&self) -> usize {
        self.regexes.len()
    }
}

struct Lowering<'g, 'p> {
    graph: &'g Graph,
    predicates: &'p Predicates,
    /// Compiled DFAs keyed by pattern.
    regexes: IndexMap<String, dense::DFA<Vec<u32>>>,
    /// Predicates referenced by the graph, in first-use order.
    used: IndexMap<String, PredicateFn>,
}

impl Lowering<'_, '_> {
    fn step(&mut self, from: NodeId, edge: &Edge) -> Result<Step, LoadError> {
        self.check_refs(from, edge)?;
        let op = self.lower(&edge.matcher)?;

        // `Return` is implied by a `None` destination.
        let consuming = !edge.matcher.is_null();
        let mut pre = Vec::new();
        let mut post = Vec::new();
        let mut after = false;
        for effect in &edge.effects {
            if consuming && matches!(effect, Effect::PopContext | Effect::Return) {
                after = true;
            }
            let action = match effect {
                Effect::Call { target, return_to } => Action::Call {
                    target: *target,
                    return_to: *return_to,
                },
                Effect::PushContext { name, style } => Action::Push {
                    name: name.as_str().into(),
                    style: style.as_deref().map(Arc::from),
                },
                Effect::PopContext => Action::Pop,
                Effect::Return => continue,
            };
            if after {
                post.push(action);
            } else {
                pre.push(action);
            }
        }

        let style = if consuming {
            fold_balanced_contexts(&mut pre, &mut post)
        } else {
            None
        };
        Ok(Step {
            op,
            pre,
            post,
            style,
            to: edge.to,
        })
    }

    fn check_refs(&self, from: NodeId, edge: &Edge) -> Result<(), LoadError> {
        let targets = edge.calls().map(|(target, _)| target);
        for to in edge.successors().into_iter().chain(targets) {
            if !self.graph.is_live(to) {
                return Err(LoadError::DanglingNode { from, to });
            }
        }
        Ok(())
    }

    fn lower(&mut self, expr: &MatchExpr) -> Result<Op, LoadError> {
        if matches!(
            expr,
            MatchExpr::Sequence(_) | MatchExpr::Choice(_) | MatchExpr::Repeat { .. }
        ) && let Some(pattern) = expr.to_regex_pattern()
        {
            return Ok(Op::Regex(self.regex(&pattern)?));
        }

        Ok(match expr {
            MatchExpr::Null => Op::Null,
            MatchExpr::Literal(value) => Op::Literal(value.as_str().into()),
            MatchExpr::Range { from, to } => Op::Range(*from, *to),
            MatchExpr::Any => Op::Any,
            MatchExpr::Sequence(items) => Op::Sequence(self.lower_all(items)?),
            MatchExpr::Choice(items) => Op::Choice(self.lower_all(items)?),
            MatchExpr::Repeat { kind, expr } => {
                let inner = Box::new(self.lower(expr)?);
                match kind {
                    RepeatKind::ZeroOrMore => Op::Star(inner),
                    RepeatKind::OneOrMore => Op::Plus(inner),
                    RepeatKind::Optional => Op::Optional(inner),
                }
            }
            MatchExpr::Lookahead { positive, target } => Op::Lookahead {
                positive: *positive,
                target: match target {
                    LookaheadTarget::Inline(inner) => Lookahead::Inline(Box::new(self.lower(inner)?)),
                    LookaheadTarget::Node(id) => Lookahead::Node(*id),
                },
            },
            MatchExpr::Predicate(name) => Op::Predicate(self.predicate(name)?),
        })
    }

    fn lower_all(&mut self, items: &[MatchExpr]) -> Result<Vec<Op>, LoadError> {
        items.iter().map(|item| self.lower(item)).collect()
    }

    fn regex(&mut self, pattern: &str) -> Result<usize, LoadError> {
        if let Some(index) = self.regexes.get_index_of(pattern) {
            return Ok(index);
        }

        let dfa = dense::DFA::builder()
            .configure(
                dense::DFA::config()
                    .start_kind(StartKind::Anchored)
                    .minimize(true),
            )
            .build(pattern)
            .map_err(|e| LoadError::Regex {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        let (index, _) = self.regexes.insert_full(pattern.to_string(), dfa);
        Ok(index)
    }

    fn predicate(&mut self, name: &str) -> Result<usize, LoadError> {
        if let Some(index) = self.used.get_index_of(name) {
            return Ok(index);
        }
        let Some(f) = self.predicates.get(name) else {
            return Err(LoadError::UnknownPredicate(name.to_string()));
        };
        let (index, _) = self.used.insert_full(name.to_string(), f.clone());
        Ok(index)
    }
}

/// Folds pushes at the end of `pre` that the leading pops of `post` close
/// again into a token style, outermost first.
///
/// On consuming edges every push precedes every pop, so such a pair only
/// scopes the consumed text.
fn fold_balanced_contexts(pre: &mut Vec<Action>, post: &mut Vec<Action>) -> Option<Arc<str>> {
    let pushes = pre
        .iter()
        .rev()
        .take_while(|a| matches!(a, Action::Push { .. }))
        .count();
    let pops = post.iter().take_while(|a| matches!(a, Action::Pop)).count();
    let count = pushes.min(pops);
    if count == 0 {
        return None;
    }

    post.drain(..count);
    let styles: Vec<Arc<str>> = pre
        .drain(pre.len() - count..)
        .filter_map(|action| match action {
            Action::Push { style, .. } => style,
            _ => None,
        })
        .collect();
    if styles.is_empty() {
        None
    } else {
        Some(styles.join(" ").into())
    }
}
