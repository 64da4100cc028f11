//! Fixpoint graph simplification.
//!
//! Each round visits every live node and applies the first local rewrite
//! that fires, in priority order: choice-fold, repeat-extract,
//! lookahead-inline, sequence-splice. Call inlining only runs in rounds
//! where no local rewrite fired. Unreachable nodes are collected and
//! structural duplicates merged after every round.
//!
//! Every rewrite preserves what the runtime consumes and the context and
//! control stacks it leaves behind.

use std::collections::HashSet;

use grammode_core::{Edge, Effect, Graph, LookaheadTarget, MatchExpr, NodeId, RepeatKind};

use crate::{dce, inline, merge};

#[cfg(test)]
#[path = "simplify_tests.rs"]
mod simplify_tests;

/// What a [`simplify`] run did, for tests and tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimplifyStats {
    pub rounds: usize,
    pub choices_folded: usize,
    pub repeats_extracted: usize,
    pub lookaheads_inlined: usize,
    pub edges_spliced: usize,
    pub calls_inlined: usize,
    pub tail_calls_removed: usize,
    pub nodes_merged: usize,
    pub nodes_collected: usize,
}

/// Rewrites `graph` to a normal form with the same runtime behavior.
///
/// Running it again on its own output changes nothing.
pub fn simplify(graph: &mut Graph) -> SimplifyStats {
    let mut stats = SimplifyStats::default();
    loop {
        stats.rounds += 1;
        let mut changed = local_round(graph, &mut stats);
        if !changed {
            let removed = inline::remove_tail_calls(graph);
            stats.tail_calls_removed += removed;
            let inlined = inline::inline_called_once(graph);
            stats.calls_inlined += usize::from(inlined);
            changed = removed > 0 || inlined;
        }

        let collected = dce::remove_unreachable(graph);
        let merged = merge::merge_duplicates(graph);
        stats.nodes_collected += collected;
        stats.nodes_merged += merged;

        if !changed && collected == 0 && merged == 0 {
            return stats;
        }
    }
}

fn local_round(graph: &mut Graph, stats: &mut SimplifyStats) -> bool {
    let nodes: Vec<NodeId> = graph.live_nodes().collect();
    let mut incoming = incoming_counts(graph);
    let mut consumed: HashSet<NodeId> = HashSet::new();
    let mut changed = false;

    for node in nodes {
        if consumed.contains(&node) {
            continue;
        }
        if fold_choice(graph, node) {
            stats.choices_folded += 1;
        } else if extract_repeat(graph, node) {
            stats.repeats_extracted += 1;
        } else if inline_lookahead(graph, node) {
            stats.lookaheads_inlined += 1;
        } else if splice_sequence(graph, node, &incoming, &mut consumed) {
            stats.edges_spliced += 1;
        } else {
            continue;
        }
        changed = true;
        incoming = incoming_counts(graph);
    }
    changed
}

/// References to every node from live edges, indexed by id.
///
/// Counts destinations, return addresses and lookahead entries. Entries get
/// one extra reference for the runtime holding them.
pub(crate) fn incoming_counts(graph: &Graph) -> Vec<usize> {
    let mut counts = vec![0; graph.len()];
    for id in graph.live_nodes() {
        for edge in graph.edges(id) {
            for succ in edge.successors() {
                counts[succ as usize] += 1;
            }
        }
    }
    for entry in graph.entries() {
        counts[entry as usize] += 1;
    }
    counts
}

/// Unions two adjacent edges that lead to the same place with the same effects.
fn fold_choice(graph: &mut Graph, node: NodeId) -> bool {
    let edges = graph.edges(node);
    let Some(i) = edges.windows(2).position(|pair| {
        let (a, b) = (&pair[0], &pair[1]);
        a.to == b.to
            && a.effects == b.effects
            && !a.matcher.is_null()
            && !a.matcher.is_nullable()
            && !a.matcher.is_isolated()
            && !b.matcher.is_isolated()
    }) else {
        return false;
    };

    let edges = &mut graph.node_mut(node).edges;
    let right = edges.remove(i + 1);
    let left = std::mem::replace(&mut edges[i].matcher, MatchExpr::Null);
    edges[i].matcher = MatchExpr::choice(left, right.matcher);
    true
}

/// Turns a leading effect-free self-loop into an explicit `*` repeat.
///
/// The node keeps only the repeat; its other edges move to a new
/// continuation node.
fn extract_repeat(graph: &mut Graph, node: NodeId) -> bool {
    if graph.is_entry(node) {
        return false;
    }
    let edges = graph.edges(node);
    let Some(first) = edges.first() else {
        return false;
    };
    if edges.len() < 2
        || first.to != Some(node)
        || !first.effects.is_empty()
        || first.matcher.is_null()
        || first.matcher.is_nullable()
        || first.matcher.is_isolated()
    {
        return false;
    }

    let source = graph.node(node);
    let label = format!("{}_split", source.label);
    let span = source.span;
    let split = graph.add_node(&label, span);

    let edges = &mut graph.node_mut(node).edges;
    let rest = edges.split_off(1);
    let looped = edges.remove(0);
    edges.push(Edge::new(
        Some(split),
        MatchExpr::repeat(RepeatKind::ZeroOrMore, looped.matcher),
        Vec::new(),
    ));
    graph.node_mut(split).edges = rest;
    true
}

/// Replaces a lookahead sub-graph that is a single returning edge with
/// its match.
fn inline_lookahead(graph: &mut Graph, node: NodeId) -> bool {
    let edges = graph.edges(node);
    let found = edges.iter().enumerate().find_map(|(i, edge)| {
        let MatchExpr::Lookahead {
            positive,
            target: LookaheadTarget::Node(entry),
        } = &edge.matcher
        else {
            return None;
        };
        let [inner] = graph.edges(*entry) else {
            return None;
        };
        let trivial = inner.to.is_none()
            && inner.effects == [Effect::Return]
            && !inner.matcher.is_isolated();
        trivial.then(|| (i, *positive, inner.matcher.clone()))
    });
    let Some((i, positive, matcher)) = found else {
        return false;
    };

    graph.node_mut(node).edges[i].matcher = MatchExpr::Lookahead {
        positive,
        target: LookaheadTarget::Inline(Box::new(matcher)),
    };
    true
}

/// Concatenates an edge with the only edge of a node nothing else reaches.
fn splice_sequence(
    graph: &mut Graph,
    node: NodeId,
    incoming: &[usize],
    consumed: &mut HashSet<NodeId>,
) -> bool {
    let found = graph.edges(node).iter().enumerate().find_map(|(i, first)| {
        let mid = first.to?;
        if mid == node
            || graph.is_entry(mid)
            || consumed.contains(&mid)
            || incoming[mid as usize] != 1
        {
            return None;
        }
        let [second] = graph.edges(mid) else {
            return None;
        };
        (second.to != Some(mid) && can_splice(first, second)).then(|| (i, mid, second.clone()))
    });
    let Some((i, mid, second)) = found else {
        return false;
    };

    let first = &mut graph.node_mut(node).edges[i];
    let spliced = splice(std::mem::replace(first, Edge::epsilon(mid)), mid, second);
    *first = spliced;
    consumed.insert(mid);
    true
}

/// Context effects must stay on the right side of the input they bracket:
/// a push cannot move before consumed input, a pop cannot move after it.
/// Isolated matches are never concatenated with anything.
fn can_splice(first: &Edge, second: &Edge) -> bool {
    let (m1, m2) = (&first.matcher, &second.matcher);
    if !m1.is_null() && (m2.is_isolated() || second.has_push()) {
        return false;
    }
    if !m2.is_null() && (m1.is_isolated() || first.has_pop()) {
        return false;
    }
    true
}

fn splice(first: Edge, mid: NodeId, second: Edge) -> Edge {
    let matcher = MatchExpr::sequence(first.matcher, second.matcher);
    let mut effects = first.effects;

    let to = if second.to.is_none() {
        let last_call = effects.iter().enumerate().rev().find_map(|(pos, e)| match e {
            Effect::Call { return_to, .. } => Some((pos, *return_to)),
            _ => None,
        });
        match last_call {
            // The return lands on the call made by `first`: resolve the pair statically.
            Some((pos, return_to)) => {
                effects.remove(pos);
                effects.extend(
                    second
                        .effects
                        .into_iter()
                        .filter(|e| !matches!(e, Effect::Return)),
                );
                Some(return_to)
            }
            None => {
                effects.extend(second.effects);
                None
            }
        }
    } else {
        effects.extend(second.effects);
        second.to
    };

    if let Some(to) = to {
        for effect in &mut effects {
            if let Effect::Call { target, .. } = effect
                && *target == mid
            {
                *target = to;
            }
        }
    }
    Edge::new(to, matcher, effects)
}
