//! Graph generation.
//!
//! Walks the normalized rule bodies and emits nodes and edges:
//!
//! - Small, non-recursive rules without a context frame are inlined at every
//!   call site.
//! - Every other rule is instantiated once per distinct argument tuple and
//!   reached through a `Call` edge. Its end node returns, closing the
//!   context frame first when the rule opens one.
//! - Repetitions use a dedicated loop node so the loop never shares a node
//!   with the surrounding sequence.
//! - Lookaheads become inline matches when the operand involves no rule
//!   calls, and a separate sub-graph ending in `Return` otherwise.
//!
//! Two entries are produced: START, which runs the document skip and the
//! start rule in a loop, and TOKEN, which tries every token rule and falls
//! back to a single arbitrary character.

use grammode_core::{Edge, Effect, Graph, LookaheadTarget, MatchExpr, NodeId, RepeatKind, Span};

use crate::ast::{Expr, ExprKind, Grammar, RuleDecl, same_shapes};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::resolve::{RuleId, RuleTable, resolve};

#[cfg(test)]
#[path = "build_tests.rs"]
mod build_tests;

/// Rules whose body weighs at most this much are inlined at call sites.
pub const INLINE_THRESHOLD: usize = 8;

/// Distinct argument tuples a parametrized rule may be instantiated with.
pub const MAX_INSTANCES_PER_RULE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    pub(crate) emit_token_entry: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            emit_token_entry: true,
        }
    }
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether to build the TOKEN fallback entry.
    pub fn emit_token_entry(mut self, emit: bool) -> Self {
        self.emit_token_entry = emit;
        self
    }

    pub fn get_emit_token_entry(&self) -> bool {
        self.emit_token_entry
    }
}

/// Builds the unsimplified graph for `grammar`.
///
/// The graph is only meaningful when the returned diagnostics hold no errors.
pub fn build_graph(grammar: &Grammar, options: &BuildOptions) -> (Graph, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let Some(table) = resolve(grammar, &mut diagnostics) else {
        return (Graph::new(), diagnostics);
    };

    let mut builder = Builder::new(&table, diagnostics);
    builder.build_start();
    if options.emit_token_entry {
        builder.build_token();
    }
    (builder.graph, builder.diagnostics)
}

struct Instance {
    args: Vec<Expr>,
    entry: NodeId,
}

/// Naming and source span for nodes created while generating one rule.
#[derive(Clone)]
struct Scope {
    label: String,
    span: Span,
}

struct Builder<'t, 'g> {
    table: &'t RuleTable<'g>,
    graph: Graph,
    diagnostics: Diagnostics,
    instances: Vec<Vec<Instance>>,
    limit_reported: Vec<bool>,
    scope: Scope,
}

impl<'t, 'g> Builder<'t, 'g> {
    fn new(table: &'t RuleTable<'g>, diagnostics: Diagnostics) -> Self {
        let count = table.rules.len();
        Self {
            table,
            graph: Graph::new(),
            diagnostics,
            instances: (0..count).map(|_| Vec::new()).collect(),
            limit_reported: vec![false; count],
            scope: Scope {
                label: "START".to_string(),
                span: Span::default(),
            },
        }
    }

    fn build_start(&mut self) {
        let table = self.table;
        let decl = table.decl(table.start);
        let start = self.graph.start();
        self.scope = Scope {
            label: "START".to_string(),
            span: decl.span,
        };

        match &decl.skip {
            Some(skip) => {
                let mid = self.node(None);
                self.generate(start, mid, skip);
                self.call(mid, start, &decl.name, &[], decl.span);
            }
            None => self.call(start, start, &decl.name, &[], decl.span),
        }
    }

    fn build_token(&mut self) {
        let table = self.table;
        self.scope = Scope {
            label: "TOKEN".to_string(),
            span: Span::default(),
        };
        let token = self.node(None);
        let end = self.node(Some("end"));
        self.graph.set_token(Some(token));

        for id in table.tokens() {
            let decl = table.decl(id);
            self.call(token, end, &decl.name, &[], decl.span);
        }
        self.edge(token, end, MatchExpr::Any);
        self.graph
            .add_edge(end, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));
    }

    fn node(&mut self, suffix: Option<&str>) -> NodeId {
        let span = self.scope.span;
        match suffix {
            Some(suffix) => {
                let label = format!("{}_{}", self.scope.label, suffix);
                self.graph.add_node(&label, span)
            }
            None => {
                let label = self.scope.label.clone();
                self.graph.add_node(&label, span)
            }
        }
    }

    fn edge(&mut self, from: NodeId, to: NodeId, matcher: MatchExpr) {
        self.graph.add_edge(from, Edge::new(Some(to), matcher, Vec::new()));
    }

    fn enter(&mut self, decl: &RuleDecl) -> Scope {
        std::mem::replace(
            &mut self.scope,
            Scope {
                label: decl.name.clone(),
                span: decl.span,
            },
        )
    }

    /// Emits edges from `from` to `to` matching `expr`.
    fn generate(&mut self, from: NodeId, to: NodeId, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(value) => self.literal(from, to, value),
            ExprKind::Range { from: lo, to: hi } => self.edge(from, to, MatchExpr::range(*lo, *hi)),
            ExprKind::Any => self.edge(from, to, MatchExpr::Any),
            ExprKind::Predicate(name) => {
                self.edge(from, to, MatchExpr::Predicate(name.clone()))
            }
            ExprKind::Ref { name, args } => self.call(from, to, name, args, expr.span),
            ExprKind::Sequence(items) => {
                let Some((last, init)) = items.split_last() else {
                    self.edge(from, to, MatchExpr::Null);
                    return;
                };
                let mut cur = from;
                for item in init {
                    let next = self.node(None);
                    self.generate(cur, next, item);
                    cur = next;
                }
                self.generate(cur, to, last);
            }
            ExprKind::Choice(items) => {
                for item in items {
                    self.generate(from, to, item);
                }
            }
            ExprKind::Repeat { kind, expr } => match kind {
                RepeatKind::ZeroOrMore => {
                    let lp = self.node(None);
                    self.edge(from, lp, MatchExpr::Null);
                    self.generate(lp, lp, expr);
                    self.edge(lp, to, MatchExpr::Null);
                }
                RepeatKind::OneOrMore => {
                    let lp = self.node(None);
                    self.generate(from, lp, expr);
                    self.generate(lp, lp, expr);
                    self.edge(lp, to, MatchExpr::Null);
                }
                RepeatKind::Optional => {
                    self.generate(from, to, expr);
                    self.edge(from, to, MatchExpr::Null);
                }
            },
            ExprKind::Lookahead { positive, expr } => {
                let target = match expr.as_simple_match() {
                    Some(matcher) => LookaheadTarget::Inline(Box::new(matcher)),
                    None => {
                        let start = self.node(Some("lookahead"));
                        let end = self.node(Some("lookahead_end"));
                        self.generate(start, end, expr);
                        self.graph
                            .add_edge(end, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));
                        LookaheadTarget::Node(start)
                    }
                };
                self.edge(
                    from,
                    to,
                    MatchExpr::Lookahead {
                        positive: *positive,
                        target,
                    },
                );
            }
        }
    }

    /// Splits at newlines so every `\n` gets its own edge.
    fn literal(&mut self, from: NodeId, to: NodeId, value: &str) {
        let mut parts = Vec::new();
        for (i, line) in value.split('\n').enumerate() {
            if i > 0 {
                parts.push(MatchExpr::literal("\n"));
            }
            if !line.is_empty() {
                parts.push(MatchExpr::literal(line));
            }
        }

        let Some(last) = parts.pop() else {
            self.edge(from, to, MatchExpr::Null);
            return;
        };
        let mut cur = from;
        for part in parts {
            let next = self.node(None);
            self.edge(cur, next, part);
            cur = next;
        }
        self.edge(cur, to, last);
    }

    fn call(&mut self, from: NodeId, to: NodeId, name: &str, args: &[Expr], span: Span) {
        let table = self.table;
        // Unknown names were reported during resolution.
        let Some(id) = table.get(name) else {
            return;
        };
        let decl = table.decl(id);

        if self.inlines(id) {
            let body = table.bodies[id].substitute(&decl.params, args);
            let saved = self.enter(decl);
            self.generate(from, to, &body);
            self.scope = saved;
            return;
        }

        if let Some(entry) = self.instance(id, args, span) {
            self.graph.add_edge(
                from,
                Edge::new(
                    Some(entry),
                    MatchExpr::Null,
                    vec![Effect::Call {
                        target: entry,
                        return_to: to,
                    }],
                ),
            );
        }
    }

    fn inlines(&self, id: RuleId) -> bool {
        let decl = self.table.decl(id);
        !self.table.recursive[id]
            && !decl.pushes_context()
            && self.table.bodies[id].weight() <= INLINE_THRESHOLD
    }

    /// Entry node of `id` instantiated with `args`, generating it on first use.
    fn instance(&mut self, id: RuleId, args: &[Expr], span: Span) -> Option<NodeId> {
        if let Some(found) = self.instances[id]
            .iter()
            .find(|inst| same_shapes(&inst.args, args))
        {
            return Some(found.entry);
        }

        let table = self.table;
        let decl = table.decl(id);
        if self.instances[id].len() >= MAX_INSTANCES_PER_RULE {
            if !std::mem::replace(&mut self.limit_reported[id], true) {
                self.diagnostics
                    .report(DiagnosticKind::InstantiationLimit, span)
                    .message(&decl.name)
                    .related_to("declared here", decl.span)
                    .emit();
            }
            return None;
        }

        let saved = self.enter(decl);
        let entry = self.node(None);
        // Registered before the body is generated so recursive calls find it.
        self.instances[id].push(Instance {
            args: args.to_vec(),
            entry,
        });

        let body = table.bodies[id].substitute(&decl.params, args);
        let end = self.node(Some("end"));
        if decl.pushes_context() {
            let body_start = self.node(None);
            self.graph.add_edge(
                entry,
                Edge::new(
                    Some(body_start),
                    MatchExpr::Null,
                    vec![Effect::PushContext {
                        name: decl.name.clone(),
                        style: decl.style.clone(),
                    }],
                ),
            );
            self.generate(body_start, end, &body);
            self.graph.add_edge(
                end,
                Edge::new(
                    None,
                    MatchExpr::Null,
                    vec![Effect::PopContext, Effect::Return],
                ),
            );
        } else {
            self.generate(entry, end, &body);
            self.graph
                .add_edge(end, Edge::new(None, MatchExpr::Null, vec![Effect::Return]));
        }

        self.scope = saved;
        Some(entry)
    }
}
