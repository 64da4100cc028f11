//! Rule table construction and validation.
//!
//! Checks everything the builder relies on (unique names, a single start
//! rule, defined references with matching arity) and computes which rules
//! are recursive. Rule bodies are normalized here so the builder sees skip
//! expressions already threaded through every sequence.

use grammode_core::Span;
use indexmap::IndexMap;

use crate::ast::{Expr, Grammar, RuleDecl};
use crate::diagnostics::{DiagnosticKind, Diagnostics};

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod resolve_tests;

pub(crate) type RuleId = usize;

/// Validated view of a grammar, ready for graph generation.
#[derive(Debug)]
pub(crate) struct RuleTable<'g> {
    pub rules: &'g [RuleDecl],
    pub index: IndexMap<&'g str, RuleId>,
    /// Bodies with skip expressions inserted.
    pub bodies: Vec<Expr>,
    /// Reachable from itself through rule references, arguments included.
    pub recursive: Vec<bool>,
    pub start: RuleId,
}

impl<'g> RuleTable<'g> {
    pub fn get(&self, name: &str) -> Option<RuleId> {
        self.index.get(name).copied()
    }

    pub fn decl(&self, id: RuleId) -> &'g RuleDecl {
        &self.rules[id]
    }

    pub fn tokens(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.index
            .values()
            .copied()
            .filter(|&id| self.rules[id].token)
    }
}

/// Builds the rule table, reporting every problem found.
///
/// Returns `None` when the grammar has errors the builder cannot work around.
pub(crate) fn resolve<'g>(
    grammar: &'g Grammar,
    diagnostics: &mut Diagnostics,
) -> Option<RuleTable<'g>> {
    let rules = grammar.rules.as_slice();
    if rules.is_empty() {
        diagnostics
            .report(DiagnosticKind::EmptyGrammar, Span::default())
            .emit();
        return None;
    }

    let mut index: IndexMap<&str, RuleId> = IndexMap::new();
    for (id, rule) in rules.iter().enumerate() {
        if let Some(&first) = index.get(rule.name.as_str()) {
            diagnostics
                .report(DiagnosticKind::DuplicateRule, rule.span)
                .message(&rule.name)
                .related_to("first defined here", rules[first].span)
                .emit();
            continue;
        }
        index.insert(&rule.name, id);
    }

    let mut start: Option<RuleId> = None;
    for &id in index.values() {
        let rule = &rules[id];
        if !rule.start {
            continue;
        }
        match start {
            Some(first) => diagnostics
                .report(DiagnosticKind::MultipleStartRules, rule.span)
                .message(&rule.name)
                .related_to("first start rule", rules[first].span)
                .emit(),
            None => start = Some(id),
        }
    }
    let start = start.unwrap_or(0);

    for &id in index.values() {
        let rule = &rules[id];
        if (rule.token || id == start) && !rule.params.is_empty() {
            diagnostics
                .report(DiagnosticKind::EntryRuleWithParams, rule.span)
                .message(&rule.name)
                .emit();
        }
    }

    let mut calls: Vec<Vec<RuleId>> = vec![Vec::new(); rules.len()];
    let mut used = vec![false; rules.len()];
    used[start] = true;
    for &id in index.values() {
        let rule = &rules[id];
        used[id] |= rule.token;
        let mut check = |name: &str, args: &[Expr], span: Span| {
            if rule.params.iter().any(|p| p == name) {
                if !args.is_empty() {
                    diagnostics
                        .report(DiagnosticKind::ParamWithArguments, span)
                        .message(name)
                        .emit();
                }
                return;
            }
            let Some(&callee) = index.get(name) else {
                diagnostics
                    .report(DiagnosticKind::UndefinedReference, span)
                    .message(name)
                    .emit();
                return;
            };
            let expected = rules[callee].params.len();
            if args.len() != expected {
                diagnostics
                    .report(DiagnosticKind::WrongArgumentCount, span)
                    .message(format!(
                        "`{}` expects {}, got {}",
                        name,
                        expected,
                        args.len()
                    ))
                    .related_to("declared here", rules[callee].span)
                    .emit();
            }
            if callee != id {
                used[callee] = true;
            }
            calls[id].push(callee);
        };
        rule.body.visit_refs(&mut check);
        if let Some(skip) = &rule.skip {
            skip.visit_refs(&mut check);
        }
    }

    if diagnostics.has_errors() {
        return None;
    }

    for &id in index.values() {
        if !used[id] {
            diagnostics
                .report(DiagnosticKind::UnusedRule, rules[id].span)
                .message(&rules[id].name)
                .emit();
        }
    }

    let recursive = (0..rules.len())
        .map(|id| reaches(&calls, id, id))
        .collect();
    let bodies = rules
        .iter()
        .map(|rule| rule.body.normalize(rule.skip.as_ref()))
        .collect();

    Some(RuleTable {
        rules,
        index,
        bodies,
        recursive,
        start,
    })
}

/// Whether `target` is reachable from `from` in one or more steps.
fn reaches(calls: &[Vec<RuleId>], from: RuleId, target: RuleId) -> bool {
    let mut visiting = vec![false; calls.len()];
    let mut stack: Vec<RuleId> = calls[from].clone();
    while let Some(id) = stack.pop() {
        if id == target {
            return true;
        }
        if std::mem::replace(&mut visiting[id], true) {
            continue;
        }
        stack.extend(calls[id].iter().copied());
    }
    false
}
